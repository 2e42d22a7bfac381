//! Keeping pass results of one slave run and writing its reports.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use nb_io::CommandOutput;
use tracing::{error, info};

use crate::{
    pass::{BuildOutcome, BuildSteps, PassKind, PassResult},
    prelude::*,
    render::{clean_line, render_csv, render_html, render_text},
    summary::{ReportContext, SlaveSummary, summarize},
};

/// Pass results of one slave run, at most one per kind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResultStore {
    results: BTreeMap<PassKind, PassResult>,
}

impl ResultStore {
    /// Record `result` unless a result of the same kind is already present.
    ///
    /// Returns whether the result was stored. A rejected result leaves the
    /// store untouched and is logged.
    pub fn record(&mut self, result: PassResult) -> bool {
        let kind = result.kind();
        if self.results.contains_key(&kind) {
            error!("{kind} result already recorded, ignoring the new one");
            return false;
        }
        self.results.insert(kind, result);
        true
    }

    pub fn get(&self, kind: PassKind) -> Option<&PassResult> {
        self.results.get(&kind)
    }

    pub fn contains(&self, kind: PassKind) -> bool {
        self.results.contains_key(&kind)
    }

    pub fn build(&self) -> Option<&BuildOutcome> {
        match self.results.get(&PassKind::Build) {
            Some(PassResult::Build(outcome)) => Some(outcome),
            _ => None,
        }
    }

    /// Results in report column order.
    pub fn iter(&self) -> impl Iterator<Item = &PassResult> {
        self.results.values()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Write `lines` to `path`, logging instead of failing.
pub(crate) fn write_artifact<'a>(path: &Path, lines: impl Iterator<Item = &'a str>) {
    let result = File::create(path).and_then(|mut file| {
        for line in lines {
            writeln!(file, "{}", clean_line(line))?;
        }
        Ok(())
    });
    if let Err(err) = result {
        error!("Failed to write {} - {err}", path.display());
    }
}

fn write_output(dir: &Path, name: &str, output: &CommandOutput) {
    write_artifact(&dir.join(name), output.lines());
}

/// Records the results of a slave run and renders its reports into the
/// slave's log directory.
#[derive(Debug)]
pub struct ResultPublisher {
    context: ReportContext,
    log_dir: PathBuf,
    store: ResultStore,
}

impl ResultPublisher {
    /// `log_dir` is the per-slave directory that is collected by the master.
    pub fn new(context: ReportContext, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            context,
            log_dir: log_dir.into(),
            store: ResultStore::default(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn context(&self) -> &ReportContext {
        &self.context
    }

    /// Record a pass result and keep its raw outputs next to the reports.
    pub fn record(&mut self, result: PassResult) -> bool {
        if self.store.contains(result.kind()) {
            return self.store.record(result);
        }
        self.write_artifacts(&result);
        info!(
            "{} - {} - {} {}",
            self.context.config_name,
            self.context.slave_name,
            result.kind(),
            if result.succeeded() { "passed" } else { "failed" }
        );
        self.store.record(result)
    }

    fn write_artifacts(&self, result: &PassResult) {
        if let Err(err) = fs::create_dir_all(&self.log_dir) {
            error!("Failed to create {} - {err}", self.log_dir.display());
            return;
        }
        let dir = self.log_dir.as_path();
        match result {
            PassResult::Build(outcome) => {
                if let BuildSteps::Ran {
                    dependencies,
                    compile,
                    install,
                } = &outcome.steps
                {
                    write_output(dir, "build.dep", dependencies);
                    write_output(dir, "build.make", compile);
                    write_output(dir, "build.install", install);
                }
            }
            PassResult::Regression(outcome) => {
                for run in &outcome.runs {
                    let rt = run.runtime.suffix();
                    write_output(dir, &format!("regtest-make.{rt}"), &run.build);
                    write_output(dir, &format!("regtest-run.{rt}"), &run.run);
                }
            }
            PassResult::Performance(outcome) => {
                for run in &outcome.runs {
                    let rt = run.runtime.suffix();
                    write_artifact(
                        &dir.join(format!("perftest.{rt}")),
                        run.makefile
                            .lines()
                            .chain(run.dependencies.lines())
                            .chain(run.build.lines()),
                    );
                    for point in &run.points {
                        write_output(dir, &format!("perftest.{rt}-{}", point.cps), &point.output);
                    }
                }
            }
            PassResult::PluginBuild(outcome) => {
                write_output(dir, "plugin-build.out", &outcome.output);
            }
            // These passes keep their own logs while they run
            PassResult::Function(_) | PassResult::Product(_) => {}
        }
    }

    /// Close the run at `end`.
    pub fn finish(&mut self, end: NaiveDateTime) {
        self.context.end = end;
    }

    pub fn summary(&self) -> SlaveSummary {
        summarize(&self.store, &self.context)
    }

    fn dump(&self, name: &str, content: String) -> Result<PathBuf> {
        fs::create_dir_all(&self.log_dir)?;
        let path = self.log_dir.join(name);
        fs::write(&path, content).map_err(|source| Error::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn dump_csv(&self) -> Result<PathBuf> {
        self.dump("report.csv", render_csv(&self.summary()))
    }

    pub fn dump_txt(&self) -> Result<PathBuf> {
        self.dump("report.txt", render_text(&self.store, &self.summary()))
    }

    pub fn dump_html(&self) -> Result<PathBuf> {
        self.dump("report.html", render_html(&self.store, &self.summary()))
    }

    /// Write every report, logging the ones that could not be written.
    pub fn dump_all(&self) {
        for result in [self.dump_csv(), self.dump_txt(), self.dump_html()] {
            match result {
                Ok(path) => info!("Report written to {}", path.display()),
                Err(err) => error!(
                    "{} - {} - {err}",
                    self.context.config_name, self.context.slave_name
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pass::fixtures::*,
        summary::{CellStatus, fixtures::context},
    };

    #[test]
    fn test_second_record_is_rejected() {
        let mut store = ResultStore::default();
        assert!(store.record(regression(true)));
        let before = store.clone();
        assert!(!store.record(regression(false)));
        assert_eq!(store, before);
        assert_eq!(store.len(), 1);
        assert!(store.get(PassKind::Regression).is_some_and(PassResult::succeeded));
    }

    #[test]
    fn test_publisher_writes_artifacts_and_reports() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let log_dir = dir.path().join("lab1");
        let mut publisher = ResultPublisher::new(context(), &log_dir);

        assert!(publisher.record(build(ok("\x1b[32mcompiled\x1b[0m"))));
        assert!(publisher.record(regression(false)));
        assert!(!publisher.record(regression(true)));

        assert_eq!(
            fs::read_to_string(log_dir.join("build.make")).expect("Missing artifact"),
            "compiled\n"
        );
        assert!(log_dir.join("regtest-run.rt1").exists());

        publisher.dump_all();
        let csv = fs::read_to_string(log_dir.join("report.csv")).expect("Missing csv");
        assert!(csv.trim_end().ends_with(",0,1,-1,-1,-1,-1"));
        assert!(log_dir.join("report.txt").exists());
        assert!(log_dir.join("report.html").exists());
        assert_eq!(publisher.summary().cell(PassKind::Regression), CellStatus::Failure);
    }
}
