//! Command-line interface of the nightly build harness.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface of the nightly build harness.
#[derive(Parser)]
#[command(name = "nbuild")]
#[command(about = "Nightly build - Build and test every configuration on its slaves")]
pub struct Cli {
    /// Path to the catalog file
    #[arg(long, default_value = "./nightly.toml")]
    pub catalog: PathBuf,

    /// Harness log file, relocated next to the slave logs in slave role
    #[arg(long, default_value = "./nbuild.log")]
    pub log_file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Prepare, distribute and collect a full cycle, then publish the results
    Master {
        /// Comma separated configurations, all of them when omitted
        #[arg(short, long)]
        configs: Option<String>,

        /// Comma separated `Name <address>` recipients replacing the catalog's
        #[arg(short = 'A', long)]
        recipients: Option<String>,

        /// Test passes to run, any of r, p, f, v, e
        #[arg(short, long)]
        tests: Option<String>,

        /// Use an existing source tree instead of checking out
        #[arg(short = 'p', long)]
        source_path: Option<PathBuf>,

        /// Start a new scoring period
        #[arg(short, long)]
        reset: bool,
    },
    /// Build and test one configuration on this machine
    Slave {
        /// Name of this slave in the catalog
        #[arg(short, long)]
        slave: String,

        /// Configuration to build
        #[arg(short, long)]
        configs: String,

        /// Test passes to run, any of r, p, f, v, e
        #[arg(short, long)]
        tests: Option<String>,
    },
    /// Print the recipients of the report
    DumpRecipients,
    /// Print every configuration with the slaves building it
    DumpConfigs,
}
