//! The slave role: build one configuration, run its test passes and leave
//! the reports for the master to collect.

use std::{fs, path::Path, time::Duration};

use nb_config::{BuildConfig, Catalog};
use nb_report::{HostInfo, PassResult, ReportContext, ResultPublisher, pass::now};
use tracing::{error, info, warn};

use crate::{
    concurrent::{Job, run_all},
    distribute::{HARNESS_BINARY, HARNESS_CATALOG},
    passes::{self, PassContext, product::ProductBuilder},
    prelude::*,
};

const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// The C compiler whose version ends up in the reports.
fn compiler(config: &BuildConfig) -> String {
    let cc = config.cc.clone().unwrap_or_else(|| String::from("gcc"));
    match &config.gcc_dir {
        Some(gcc_dir) => gcc_dir.join("bin").join(cc).display().to_string(),
        None => cc,
    }
}

/// The enabled test passes, run concurrently once the build succeeded.
fn run_test_passes(ctx: &PassContext, builder: &dyn ProductBuilder) -> Vec<PassResult> {
    let config = ctx.config;
    let mut jobs: Vec<(String, Job<PassResult>)> = Vec::new();
    if config.regtest {
        jobs.push((String::from("regression"), Box::new(|| passes::regression::run(ctx))));
    }
    if config.perftest {
        jobs.push((String::from("performance"), Box::new(|| passes::performance::run(ctx))));
    }
    if config.functest {
        jobs.push((String::from("function"), Box::new(|| passes::function::run(ctx))));
    }
    if config.vobtest {
        jobs.push((String::from("product"), Box::new(|| passes::product::run(ctx, builder))));
    }
    if config.eclipse {
        jobs.push((String::from("plugin"), Box::new(|| passes::plugin::run(ctx))));
    }
    run_all(jobs)
        .into_iter()
        .filter_map(|(name, result)| {
            if result.is_none() {
                error!("{} - The {name} pass did not complete", ctx.label());
            }
            result
        })
        .collect()
}

/// Run one configuration on this machine and write its reports.
///
/// Returns whether every recorded pass succeeded.
pub fn run_configuration(
    catalog: &Catalog,
    config: &BuildConfig,
    slave_name: &str,
    log_file: &Path,
    builder: &dyn ProductBuilder,
) -> bool {
    let ctx = PassContext::new(catalog, config, slave_name);
    let label = ctx.label();
    info!("{label} - Slave run started");
    let begin = now();
    let context = ReportContext {
        config_name: config.name.clone(),
        slave_name: slave_name.to_string(),
        begin,
        end: begin,
        host: HostInfo::capture(&compiler(config)),
    };
    let mut publisher = ResultPublisher::new(context, ctx.log_dir());

    let build = passes::build::run(&ctx);
    let built = build.succeeded();
    let mut succeeded = built;
    publisher.record(build);
    if built {
        for result in run_test_passes(&ctx, builder) {
            succeeded &= result.succeeded();
            publisher.record(result);
        }
    }
    publisher.finish(now());
    publisher.dump_all();

    clean_up(&ctx, log_file);
    info!("{label} - Slave run finished");
    succeeded
}

/// Archive the built tree, drop everything shipped by the master and move
/// the harness log next to the reports.
fn clean_up(ctx: &PassContext, log_file: &Path) {
    let label = ctx.label();
    let build_dir = ctx.build_dir();
    let source_dir_name = &ctx.common().source_dir_name;
    if ctx.source_dir().is_dir() {
        let archived = ctx
            .command(
                "tar",
                vec![
                    String::from("cjf"),
                    format!("{source_dir_name}-{}-bin.tar.bz2", ctx.config.name),
                    source_dir_name.clone(),
                ],
            )
            .current_dir(build_dir)
            .timeout(ARCHIVE_TIMEOUT)
            .output();
        if !archived.success() {
            warn!("{label} - Failed to archive the built tree - status {}", archived.status);
        }
        if let Err(err) = fs::remove_dir_all(ctx.source_dir()) {
            warn!("{label} - Failed to remove the built tree - {err}");
        }
    }

    let shipped = [ctx.source_package(), HARNESS_BINARY.to_string(), HARNESS_CATALOG.to_string()];
    for name in shipped {
        let path = build_dir.join(name);
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                warn!("{label} - Failed to remove {} - {err}", path.display());
            }
        }
    }

    let Some(file_name) = log_file.file_name() else {
        return;
    };
    if !log_file.is_file() {
        return;
    }
    let target = ctx.log_dir().join(file_name);
    if fs::rename(log_file, &target).is_err() {
        let moved = fs::copy(log_file, &target).and_then(|_| fs::remove_file(log_file));
        if let Err(err) = moved {
            warn!("{label} - Failed to move {} - {err}", log_file.display());
        }
    }
}

/// Run every configuration named in `config_names` for `slave_name`.
pub fn run_slave(
    catalog: &Catalog,
    slave_name: &str,
    config_names: &[String],
    log_file: &Path,
    builder: &dyn ProductBuilder,
) -> Result<()> {
    if !catalog.slaves.contains_key(slave_name) {
        return Err(Error::UnknownSlave(slave_name.to_string()));
    }
    for name in config_names {
        let config = catalog
            .config(name)
            .ok_or_else(|| Error::UnknownConfiguration(name.clone()))?;
        run_configuration(catalog, config, slave_name, log_file, builder);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use nb_report::{CellStatus, PassKind, SlaveRun, aggregate};

    use super::*;
    use crate::{passes::product::DefaultProductBuilder, testing::catalog};

    const FAKE_MAKE: &str = "#!/bin/sh
case \"$1\" in
  run) echo 'Verdict statistics: 0 none, 12 pass (100.00%), 0 inconc, 0 fail, 0 error' ;;
  install) mkdir -p \"$TTCN3_DIR/bin\" ;;
esac
exit 0
";

    fn unpacked_tree(config: &BuildConfig) {
        let source = config.build_dir.join("TTCNv3");
        fs::create_dir_all(source.join("regression_test")).expect("Couldn't create tree");
        for suite in passes::function::SUITES {
            let dir = source.join("function_test").join(suite);
            fs::create_dir_all(&dir).expect("Couldn't create suite");
            let script = dir.join("run_test");
            let body = if passes::function::criterion(passes::function::suite_name(suite))
                == nb_report::pass::SuiteCriterion::Counts
            {
                "#!/bin/sh\necho 'Total number of tests: 3'\necho 'PASSED test cases: 3'\n"
            } else {
                "#!/bin/sh\nexit 0\n"
            };
            fs::write(&script, body).expect("Couldn't write suite script");
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
                .expect("Couldn't chmod");
        }
    }

    #[test]
    fn test_slave_run_produces_reports() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let mut catalog = catalog(dir.path());
        let make = dir.path().join("fake-make");
        fs::write(&make, FAKE_MAKE).expect("Couldn't write fake make");
        fs::set_permissions(&make, fs::Permissions::from_mode(0o755)).expect("Couldn't chmod");
        catalog.common.make_command = make.display().to_string();
        let config = catalog.configs["linux_gcc"].clone();
        unpacked_tree(&config);
        let log_file = config.build_dir.join("nbuild.log");
        fs::write(&log_file, "slave log\n").expect("Couldn't write log");

        let succeeded = run_configuration(&catalog, &config, "lab1", &log_file, &DefaultProductBuilder);
        assert!(succeeded);

        let log_dir = config.log_dir.join("lab1");
        for report in ["report.csv", "report.txt", "report.html", "nbuild.log"] {
            assert!(log_dir.join(report).is_file(), "{report} is missing");
        }
        assert!(!config.build_dir.join("TTCNv3").exists());
        assert!(!log_file.exists());

        let master_logs = dir.path().join("collected");
        let run = SlaveRun::new("lab1", "linux_gcc");
        let collected = run.log_dir(&master_logs);
        fs::create_dir_all(&collected).expect("Couldn't create dir");
        fs::copy(log_dir.join("report.csv"), collected.join("report.csv")).expect("Couldn't copy");
        let matrix = aggregate(&master_logs, &[run]);
        let cells = matrix.rows[0].cells;
        assert_eq!(cells[PassKind::Build.column()], CellStatus::Success);
        assert_eq!(cells[PassKind::Regression.column()], CellStatus::Success);
        assert_eq!(cells[PassKind::Function.column()], CellStatus::Success);
        assert_eq!(cells[PassKind::Performance.column()], CellStatus::Disabled);
    }

    #[test]
    fn test_failed_compile_skips_test_passes() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let mut catalog = catalog(dir.path());
        let make = dir.path().join("fake-make");
        fs::write(&make, "#!/bin/sh\ncase \"$1\" in\n  -j*) exit 2 ;;\nesac\nexit 0\n")
            .expect("Couldn't write fake make");
        fs::set_permissions(&make, fs::Permissions::from_mode(0o755)).expect("Couldn't chmod");
        catalog.common.make_command = make.display().to_string();
        let config = catalog.configs["linux_gcc"].clone();
        unpacked_tree(&config);

        let succeeded = run_configuration(
            &catalog,
            &config,
            "lab1",
            &dir.path().join("no-log-file"),
            &DefaultProductBuilder,
        );
        assert!(!succeeded);

        let log_dir = config.log_dir.join("lab1");
        let csv = fs::read_to_string(log_dir.join("report.csv")).expect("No csv");
        assert!(csv.trim_end().ends_with(",linux_gcc,lab1,1,-1,-1,-1,-1,-1"));
        assert!(log_dir.join("report.txt").is_file());
        assert!(log_dir.join("report.html").is_file());
        assert!(!config.build_dir.join("TTCNv3").exists());
    }

    #[test]
    fn test_unknown_slave() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        let result = run_slave(
            &catalog,
            "lab9",
            &[String::from("linux_gcc")],
            &dir.path().join("nbuild.log"),
            &DefaultProductBuilder,
        );
        assert!(matches!(result, Err(Error::UnknownSlave(_))));
    }
}
