use clap::{Parser, Subcommand};

/// Top-level CLI parser for the `tracker` binary.
#[derive(Debug, Parser)]
#[command(
    name = "tracker",
    version,
    about = "Student tracker - nightly import and CRM export"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Import students, attendance, schedule, courses, and code-review
    /// comments into the tracker.
    Import,
    /// Export students, attendance, and schedule to the CRM.
    CrmExport,
    /// Delete old entries from the log trail.
    PruneLogs {
        /// Retention in days (defaults to import.log_retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}
