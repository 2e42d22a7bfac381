//! The master role: prepare every selected configuration, hand it to its
//! slaves and collect what they produced.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use nb_config::{Catalog, TestSelection};
use nb_io::transport::local_host_names;
use nb_report::{ReportMatrix, SlaveRun, Span, pass::now};
use tracing::{error, info, warn};

use crate::{
    concurrent::{Job, run_all},
    distribute::{Distribution, HARNESS_CATALOG, HarnessFiles, transport_for},
    mail::Mailer,
    prelude::*,
    prepare::prepare_source,
    publish::gather_and_present,
};

/// Where one configuration stands in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigState {
    Pending,
    Preparing,
    Distributing,
    Collecting,
    Done,
    /// Preparation failed; none of its slaves were contacted.
    Abandoned,
}

impl ConfigState {
    pub fn can_advance_to(self, next: ConfigState) -> bool {
        use ConfigState::*;
        matches!(
            (self, next),
            (Pending, Preparing)
                | (Preparing, Distributing)
                | (Preparing, Abandoned)
                | (Distributing, Collecting)
                | (Collecting, Done)
        )
    }
}

impl fmt::Display for ConfigState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One configuration's progress, every transition logged.
#[derive(Debug)]
pub struct ConfigProgress {
    name: String,
    state: ConfigState,
}

impl ConfigProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ConfigState::Pending,
        }
    }

    pub fn state(&self) -> ConfigState {
        self.state
    }

    pub fn advance(&mut self, next: ConfigState) {
        if !self.state.can_advance_to(next) {
            warn!("{} - Unexpected transition {} -> {next}", self.name, self.state);
        }
        info!("{} - {} -> {next}", self.name, self.state);
        self.state = next;
    }
}

/// Command line choices that shape a cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    pub tests: Option<TestSelection>,
    pub source_path: Option<PathBuf>,
    /// Start a new scoring period.
    pub reset: bool,
}

/// Empty `dir`, creating it when needed.
fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

struct Cycle<'a> {
    catalog: &'a Catalog,
    options: &'a CycleOptions,
    harness: &'a HarnessFiles,
    local_names: &'a [String],
    product_lock: &'a Mutex<()>,
    runs: &'a Mutex<Vec<SlaveRun>>,
}

impl Cycle<'_> {
    /// Drive one configuration from preparation to collection.
    fn coordinate(&self, config_name: &str) -> ConfigState {
        let mut progress = ConfigProgress::new(config_name);
        let Some(config) = self.catalog.config(config_name) else {
            error!("{config_name} - Not in the catalog");
            progress.advance(ConfigState::Preparing);
            progress.advance(ConfigState::Abandoned);
            return progress.state();
        };
        let common = &self.catalog.common;

        progress.advance(ConfigState::Preparing);
        let build_dir = common.build_dir.join(config_name);
        let log_dir = common.log_dir.join(config_name);
        let package = match prepare_source(
            self.catalog,
            config,
            &build_dir,
            &log_dir,
            self.options.source_path.as_deref(),
        ) {
            Ok(package) => package,
            Err(err) => {
                error!("{config_name} - Preparation failed - {err}");
                progress.advance(ConfigState::Abandoned);
                return progress.state();
            }
        };

        progress.advance(ConfigState::Distributing);
        let distribution = Distribution {
            catalog: self.catalog,
            config,
            source_package: &package,
            harness: self.harness,
            tests: self.options.tests.as_ref(),
            product_lock: self.product_lock,
        };
        let mut started = Vec::new();
        for slave in self.catalog.slaves_for(config_name) {
            self.runs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(SlaveRun::new(&slave.name, config_name));
            let transport = transport_for(slave, self.local_names);
            if distribution.run_on(slave, transport.as_ref()) {
                started.push((slave, transport));
            }
        }

        progress.advance(ConfigState::Collecting);
        for (slave, transport) in started {
            let run = SlaveRun::new(&slave.name, config_name);
            distribution.collect(slave, transport.as_ref(), &run.log_dir(&common.log_dir));
        }
        progress.advance(ConfigState::Done);
        progress.state()
    }
}

/// Run a complete nightly cycle over `config_names` and present it.
pub fn run_cycle(
    catalog: &Catalog,
    config_names: &[String],
    options: &CycleOptions,
    mailer: &dyn Mailer,
) -> Result<ReportMatrix> {
    let begin = now();
    let common = &catalog.common;
    reset_dir(&common.build_dir)?;
    reset_dir(&common.log_dir)?;

    let harness = HarnessFiles {
        binary: std::env::current_exe()?,
        catalog: common.build_dir.join(HARNESS_CATALOG),
    };
    catalog.write_file(&harness.catalog)?;

    let local_names = local_host_names();
    let product_lock = Mutex::new(());
    let runs = Mutex::new(Vec::new());
    let cycle = Cycle {
        catalog,
        options,
        harness: &harness,
        local_names: &local_names,
        product_lock: &product_lock,
        runs: &runs,
    };

    let jobs: Vec<(String, Job<ConfigState>)> = config_names
        .iter()
        .filter(|name| {
            let used = catalog.is_configuration_used(name);
            if !used {
                warn!("{name} - No slave builds this configuration, skipped");
            }
            used
        })
        .map(|name| {
            let cycle = &cycle;
            let job: Job<ConfigState> = Box::new(move || cycle.coordinate(name));
            (name.clone(), job)
        })
        .collect();
    for (name, state) in run_all(jobs) {
        match state {
            Some(state) => info!("{name} - Finished as {state}"),
            None => error!("{name} - Coordination did not complete"),
        }
    }

    let runs = runs.into_inner().unwrap_or_else(PoisonError::into_inner);
    info!("Cycle finished with {} slave runs", runs.len());
    gather_and_present(catalog, Span::new(begin, now()), &runs, options.reset, mailer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::catalog;

    #[test]
    fn test_transitions() {
        use ConfigState::*;
        assert!(Pending.can_advance_to(Preparing));
        assert!(Preparing.can_advance_to(Abandoned));
        assert!(Collecting.can_advance_to(Done));
        assert!(!Pending.can_advance_to(Distributing));
        assert!(!Abandoned.can_advance_to(Distributing));
        assert!(!Done.can_advance_to(Preparing));
    }

    #[test]
    fn test_progress_follows_transitions() {
        let mut progress = ConfigProgress::new("linux_gcc");
        assert_eq!(progress.state(), ConfigState::Pending);
        progress.advance(ConfigState::Preparing);
        progress.advance(ConfigState::Distributing);
        assert_eq!(progress.state(), ConfigState::Distributing);
    }

    #[test]
    fn test_failed_preparation_abandons_configuration() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let mut catalog = catalog(dir.path());
        catalog.common.checkout.head = String::from("exit 1");
        let harness = HarnessFiles {
            binary: dir.path().join("nbuild"),
            catalog: dir.path().join(HARNESS_CATALOG),
        };
        let product_lock = Mutex::new(());
        let runs = Mutex::new(Vec::new());
        let options = CycleOptions::default();
        let cycle = Cycle {
            catalog: &catalog,
            options: &options,
            harness: &harness,
            local_names: &[],
            product_lock: &product_lock,
            runs: &runs,
        };

        assert_eq!(cycle.coordinate("linux_gcc"), ConfigState::Abandoned);
        assert!(runs.lock().expect("Poisoned").is_empty());
        assert!(
            catalog
                .common
                .log_dir
                .join("linux_gcc/checkout-linux_gcc.stdout")
                .is_file()
        );
    }

    #[test]
    fn test_reset_dir() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let target = dir.path().join("build");
        fs::create_dir_all(target.join("old")).expect("Couldn't create dir");
        reset_dir(&target).expect("Couldn't reset");
        assert!(target.is_dir());
        assert!(!target.join("old").exists());
    }
}
