//! Nightly build harness (nbuild)
//!
//! Builds and tests a compiler toolchain on a set of build slaves every
//! night and publishes the results. The same binary plays both roles:
//!
//! - **Master**: checks out and patches the sources of every selected
//!   configuration, ships them to the slaves, collects the reports, then
//!   writes the result matrix email, the static site and the plots
//! - **Slave**: builds one configuration, runs its test passes and leaves
//!   `report.{csv,txt,html}` for the master to collect
//!
//! Slaves are reached over `ssh`/`scp`, or directly when they are the
//! machine the master runs on.

mod cli;
mod commands;
mod concurrent;
mod distribute;
mod env;
mod error;
mod mail;
mod master;
mod passes;
mod patch;
mod prelude;
mod prepare;
mod publish;
mod slave;
#[cfg(test)]
mod testing;

use std::{fs::OpenOptions, sync::Arc};

use clap::Parser;
use cli::{Cli, Commands};
use nb_config::Catalog;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{handle_dump_configs, handle_dump_recipients, handle_master, handle_slave};
use crate::prelude::*;

/// Main entry point of the harness.
///
/// Initializes logging to stdout and to the harness log file, loads the
/// catalog and dispatches to the command handler.
///
/// # Examples
///
/// ```bash
/// # Nightly cycle over every configuration
/// nbuild --catalog nightly.toml master
///
/// # Two configurations, regression and function tests only, new period
/// nbuild master -c linux_gcc,solaris_cc -t rf -r
///
/// # Slave role, as started by the master
/// nbuild --catalog nightly.toml slave -s lab1 -c linux_gcc
/// ```
fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nbuild=debug,nb_report=debug,nb_config=info,nb_io=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    let catalog = Catalog::from_file(&cli.catalog)?;

    match cli.command {
        Commands::Master {
            configs,
            recipients,
            tests,
            source_path,
            reset,
        } => handle_master(catalog, configs, recipients, tests, source_path, reset),
        Commands::Slave {
            slave,
            configs,
            tests,
        } => handle_slave(catalog, &slave, &configs, tests, &cli.log_file),
        Commands::DumpRecipients => handle_dump_recipients(&catalog),
        Commands::DumpConfigs => handle_dump_configs(&catalog),
    }
}
