//! Record rendering
//!
//! Two formats, matching the streams earlier generations of this tooling
//! emitted:
//!
//! - CSV table: header `Path,Type[,Size][,MTime],Error`, RFC-style
//!   quoting, trailing empty optional fields dropped per row
//! - quoted TSV stream: `path \t type [ \t size ] [ \t errors ]` with
//!   path and error fields C-style-quoted whenever they contain a quote,
//!   tab, comma or line break
//!
//! Size renders only for error-free file records; mtime renders whenever
//! it is known.

use crate::config::OutputFormat;
use crate::record::{EntryKind, Record};
use chrono::{DateTime, Local};
use std::io::{self, Write};
use std::time::SystemTime;

pub struct Renderer<W: Write> {
    out: W,
    format: OutputFormat,
    metadata: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, format: OutputFormat, metadata: bool) -> Self {
        Self {
            out,
            format,
            metadata,
        }
    }

    /// Emit the header line. The TSV stream has none.
    pub fn write_header(&mut self) -> io::Result<()> {
        if self.format != OutputFormat::Csv {
            return Ok(());
        }
        let mut row = vec!["Path".to_string(), "Type".to_string()];
        if self.metadata {
            row.push("Size".to_string());
            row.push("MTime".to_string());
        }
        row.push("Error".to_string());
        write_csv_row(&mut self.out, row)
    }

    pub fn write_record(&mut self, record: &Record) -> io::Result<()> {
        match self.format {
            OutputFormat::Csv => {
                let fields = self.record_fields(record);
                write_csv_row(&mut self.out, fields)
            }
            OutputFormat::Tsv => self.write_tsv_record(record),
        }
    }

    pub fn finish(mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn record_fields(&self, record: &Record) -> Vec<String> {
        let mut row = vec![record.path.clone(), record.kind.as_char().to_string()];
        if self.metadata {
            row.push(match record.size {
                Some(size) if !record.has_errors() && record.kind == EntryKind::File => {
                    size.to_string()
                }
                _ => String::new(),
            });
            row.push(record.mtime.map(format_mtime).unwrap_or_default());
        }
        row.push(record.join_errors());
        row
    }

    fn write_tsv_record(&mut self, record: &Record) -> io::Result<()> {
        write!(
            self.out,
            "{}\t{}",
            cquote(&record.path),
            record.kind.as_char()
        )?;
        if self.metadata {
            match record.size {
                Some(size) if !record.has_errors() && record.kind == EntryKind::File => {
                    write!(self.out, "\t{size}")?
                }
                _ => write!(self.out, "\t")?,
            }
        }
        if record.has_errors() {
            write!(self.out, "\t{}", cquote(&record.join_errors()))?;
        }
        writeln!(self.out)
    }
}

/// Write one CSV row, dropping trailing empty fields (never below one)
fn write_csv_row<W: Write>(out: &mut W, mut row: Vec<String>) -> io::Result<()> {
    while row.len() > 1 && row.last().is_some_and(|field| field.is_empty()) {
        row.pop();
    }
    for (i, field) in row.iter().enumerate() {
        if i != 0 {
            out.write_all(b",")?;
        }
        out.write_all(csv_quote(field).as_bytes())?;
    }
    out.write_all(b"\n")
}

fn csv_quote(field: &str) -> String {
    if !field.contains(['"', ',', '\n', '\r']) {
        return field.to_string();
    }
    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('"');
    for ch in field.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// C-style quoting: applied only when the field contains a quote, tab,
/// comma or line break; escapes backslash, quote, CR, LF and TAB
fn cquote(field: &str) -> String {
    if !field.contains(['"', '\t', ',', '\n', '\r']) {
        return field.to_string();
    }
    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('"');
    for ch in field.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\r' => quoted.push_str("\\r"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

fn format_mtime(mtime: SystemTime) -> String {
    DateTime::<Local>::from(mtime)
        .format("%Y-%m-%d %H:%M:%S%.9f %z")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordError;
    use std::io;
    use std::time::{Duration, UNIX_EPOCH};

    fn render(records: &[Record], format: OutputFormat, metadata: bool) -> String {
        let mut buf = Vec::new();
        let mut renderer = Renderer::new(&mut buf, format, metadata);
        renderer.write_header().unwrap();
        for record in records {
            renderer.write_record(record).unwrap();
        }
        renderer.finish().unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn file_record(path: &str, size: u64) -> Record {
        let mut record = Record::new(path.into(), EntryKind::File);
        record.size = Some(size);
        record.mtime = Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        record
    }

    #[test]
    fn csv_header_tracks_metadata_flag() {
        let out = render(&[], OutputFormat::Csv, false);
        assert_eq!(out, "Path,Type,Error\n");

        let out = render(&[], OutputFormat::Csv, true);
        assert_eq!(out, "Path,Type,Size,MTime,Error\n");
    }

    #[test]
    fn csv_drops_trailing_empty_fields() {
        let record = Record::new("/data/sub".into(), EntryKind::Directory);
        let out = render(&[record], OutputFormat::Csv, false);
        assert_eq!(out.lines().nth(1).unwrap(), "/data/sub,d");
    }

    #[test]
    fn csv_keeps_error_field() {
        let mut record = Record::new("/data/locked".into(), EntryKind::Directory);
        record
            .errors
            .push(RecordError::Open(io::Error::other("permission denied")));
        let out = render(&[record], OutputFormat::Csv, false);
        let line = out.lines().nth(1).unwrap();
        assert!(line.starts_with("/data/locked,d,"));
        assert!(line.contains("permission denied"));
    }

    #[test]
    fn csv_size_omitted_on_error_records() {
        let mut record = file_record("/data/file", 99);
        record
            .errors
            .push(RecordError::Stat(io::Error::other("boom")));
        let out = render(&[record], OutputFormat::Csv, true);
        let line = out.lines().nth(1).unwrap();
        // path, type, empty size, mtime, error
        assert!(line.starts_with("/data/file,f,,"));
    }

    #[test]
    fn csv_quotes_embedded_separators() {
        let record = Record::new("/data/odd, \"name\"".into(), EntryKind::File);
        let out = render(&[record], OutputFormat::Csv, false);
        assert_eq!(out.lines().nth(1).unwrap(), "\"/data/odd, \"\"name\"\"\",f");
    }

    #[test]
    fn tsv_plain_paths_stay_raw() {
        let record = file_record("/data/a.txt", 10);
        let out = render(&[record], OutputFormat::Tsv, true);
        assert_eq!(out, "/data/a.txt\tf\t10\n");
    }

    #[test]
    fn tsv_without_metadata_has_two_columns() {
        let record = Record::new("/data".into(), EntryKind::Directory);
        let out = render(&[record], OutputFormat::Tsv, false);
        assert_eq!(out, "/data\td\n");
    }

    #[test]
    fn cquote_rules() {
        assert_eq!(cquote("plain/path"), "plain/path");
        assert_eq!(cquote("back\\slash"), "back\\slash"); // no trigger chars
        assert_eq!(cquote("tab\there"), "\"tab\\there\"");
        assert_eq!(cquote("a,b"), "\"a,b\"");
        assert_eq!(cquote("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(cquote("line\nbreak"), "\"line\\nbreak\"");
        assert_eq!(cquote("mix\\\"q"), "\"mix\\\\\\\"q\"");
    }
}
