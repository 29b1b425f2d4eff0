//! Configuration types for fastfind
//!
//! CLI argument parsing with clap derive macros, validated into a
//! runtime [`WalkConfig`].

use crate::error::ConfigError;
use crate::walker::DEFAULT_MAX_TASKS;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Upper bound on the admission budget; each admitted task is a thread
const MAX_TASKS_LIMIT: usize = 4096;

/// Concurrent directory tree walker for high-latency filesystems
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fastfind",
    version,
    about = "Concurrent directory tree walker for high-latency filesystems",
    long_about = "Walks a directory tree with a bounded pool of concurrent traversal tasks,\n\
                  streaming one record per filesystem object to stdout. Built for slow\n\
                  transports: subdirectories open relative to their parent's handle, and\n\
                  on Windows listings arrive with metadata in bulk, one query per batch.",
    after_help = "EXAMPLES:\n    \
        fastfind                          # walk the current directory\n    \
        fastfind /mnt/share --stat        # collect sizes and mtimes\n    \
        fastfind /mnt/share -j 128        # cap concurrent tasks at 128\n    \
        fastfind /mnt/share --format tsv  # quoted tab-separated stream"
)]
pub struct CliArgs {
    /// Directory to walk
    #[arg(value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Collect file metadata (size and modification time)
    #[arg(short = 's', long)]
    pub stat: bool,

    /// Output format for the record stream
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Maximum concurrently running traversal tasks
    #[arg(
        short = 'j',
        long = "max-tasks",
        default_value_t = DEFAULT_MAX_TASKS,
        value_name = "NUM"
    )]
    pub max_tasks: usize,

    /// Verbose logging on stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Record stream format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Row-oriented table with a header line
    Csv,
    /// Quoted tab-separated stream
    Tsv,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct WalkConfig {
    pub root: PathBuf,
    pub metadata: bool,
    pub max_tasks: usize,
    pub format: OutputFormat,
    pub verbose: bool,
}

impl WalkConfig {
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.max_tasks == 0 || args.max_tasks > MAX_TASKS_LIMIT {
            return Err(ConfigError::InvalidMaxTasks {
                count: args.max_tasks,
                max: MAX_TASKS_LIMIT,
            });
        }
        Ok(Self {
            root: args.dir,
            metadata: args.stat,
            max_tasks: args.max_tasks,
            format: args.format,
            verbose: args.verbose,
        })
    }
}
