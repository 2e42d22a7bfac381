//! Command handlers of the nightly build harness.

use std::path::{Path, PathBuf};

use nb_config::{Catalog, TestSelection};
use tracing::info;

use crate::{
    mail::CommandMailer,
    master::{CycleOptions, run_cycle},
    passes::product::DefaultProductBuilder,
    prelude::*,
    slave::run_slave,
};

/// Prints the recipients of the report, one per line.
pub fn handle_dump_recipients(catalog: &Catalog) -> Result<()> {
    for line in catalog.dump_recipients() {
        println!("{line}");
    }
    Ok(())
}

/// Prints every configuration with the slaves that build it.
pub fn handle_dump_configs(catalog: &Catalog) -> Result<()> {
    for line in catalog.dump_configurations() {
        println!("{line}");
    }
    Ok(())
}

/// Applies the command line overrides and runs a full cycle.
pub fn handle_master(
    mut catalog: Catalog,
    configs: Option<String>,
    recipients: Option<String>,
    tests: Option<String>,
    source_path: Option<PathBuf>,
    reset: bool,
) -> Result<()> {
    let selected = catalog.select_configurations(configs.as_deref())?;
    if let Some(recipients) = recipients {
        catalog.override_recipients(&recipients);
    }
    let tests = tests
        .map(|letters| letters.parse::<TestSelection>())
        .transpose()?;
    if let Some(tests) = &tests {
        catalog.apply_tests(&selected, tests);
    }
    catalog.rewrite_foa(nb_report::pass::now());

    info!("Nightly cycle for {}", selected.join(", "));
    let options = CycleOptions {
        tests,
        source_path,
        reset,
    };
    let mailer = CommandMailer::new(&catalog.common.mail_command);
    let matrix = run_cycle(&catalog, &selected, &options, &mailer)?;
    println!("{}", matrix.to_table());
    Ok(())
}

/// Runs the configurations assigned to this slave.
pub fn handle_slave(
    mut catalog: Catalog,
    slave: &str,
    configs: &str,
    tests: Option<String>,
    log_file: &Path,
) -> Result<()> {
    let selected = catalog.select_configurations(Some(configs))?;
    if let Some(letters) = tests {
        let tests: TestSelection = letters.parse()?;
        catalog.apply_tests(&selected, &tests);
    }
    run_slave(&catalog, slave, &selected, log_file, &DefaultProductBuilder)
}
