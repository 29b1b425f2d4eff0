//! fastfind - Concurrent Directory Tree Walker
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use fastfind::cancel::{self, CancelToken};
use fastfind::config::{CliArgs, WalkConfig};
use fastfind::fs::LocalFs;
use fastfind::output::Renderer;
use fastfind::walker::{self, WalkOptions};
use std::io::{self, BufWriter};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> Result<ExitCode> {
    setup_logging(args.verbose);

    let config = WalkConfig::from_args(args).context("invalid configuration")?;

    let (cancel_handle, cancel_token) = cancel::cancel_channel();
    {
        let handle = cancel_handle.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nInterrupt received, finishing up...");
            handle.cancel();
        })
        .context("failed to install signal handler")?;
    }

    // A root that cannot be opened is fatal; there is no tree to walk
    let records = walker::walk(
        LocalFs,
        &config.root,
        WalkOptions {
            metadata: config.metadata,
            max_tasks: config.max_tasks,
        },
        cancel_token.clone(),
    )?;

    let stdout = io::stdout();
    let mut renderer = Renderer::new(
        BufWriter::new(stdout.lock()),
        config.format,
        config.metadata,
    );
    renderer.write_header().context("write output")?;

    let mut emitted: u64 = 0;
    let mut with_errors: u64 = 0;
    for record in records.iter() {
        emitted += 1;
        if record.has_errors() {
            with_errors += 1;
        }
        renderer.write_record(&record).context("write output")?;
    }
    renderer.finish().context("flush output")?;

    Ok(exit_status(&cancel_token, emitted, with_errors))
}

fn exit_status(cancel: &CancelToken, emitted: u64, with_errors: u64) -> ExitCode {
    if cancel.is_cancelled() {
        info!(records = emitted, "walk interrupted");
        return ExitCode::FAILURE;
    }
    if with_errors > 0 {
        info!(
            records = emitted,
            errors = with_errors,
            "walk completed with errors"
        );
        return ExitCode::FAILURE;
    }
    info!(records = emitted, "walk complete");
    ExitCode::SUCCESS
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("fastfind=debug,warn")
    } else {
        EnvFilter::new("fastfind=info,warn")
    };

    // Logs go to stderr; stdout carries the record stream
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
