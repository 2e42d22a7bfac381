//! The passes a slave runs for one configuration.
//!
//! Every pass takes a [`PassContext`] and returns its [`PassResult`] by
//! value; recording the result is left to the caller.

pub mod build;
pub mod function;
pub mod performance;
pub mod plugin;
pub mod product;
pub mod regression;

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use globset::{Glob, GlobMatcher};
use nb_config::{BuildConfig, Catalog, CommonConfig, ProductDescriptor};
use nb_io::{CommandOutput, Runner};
use nb_report::Runtime;
use tracing::{error, warn};

use crate::{env::ToolchainEnv, prelude::*};

const UNPACK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// What a pass needs to know about the slave run it belongs to.
pub struct PassContext<'a> {
    pub catalog: &'a Catalog,
    pub config: &'a BuildConfig,
    pub slave_name: &'a str,
    pub env: ToolchainEnv,
}

impl<'a> PassContext<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a BuildConfig, slave_name: &'a str) -> Self {
        Self {
            catalog,
            config,
            slave_name,
            env: ToolchainEnv::new(config),
        }
    }

    pub fn common(&self) -> &CommonConfig {
        &self.catalog.common
    }

    pub fn products(&self) -> &BTreeMap<String, Vec<ProductDescriptor>> {
        &self.catalog.products
    }

    pub fn build_dir(&self) -> &Path {
        &self.config.build_dir
    }

    /// The unpacked source tree.
    pub fn source_dir(&self) -> PathBuf {
        self.config.build_dir.join(&self.common().source_dir_name)
    }

    /// Name of the source package the master distributes.
    pub fn source_package(&self) -> String {
        source_package_name(&self.common().source_dir_name, &self.config.name)
    }

    /// Per-slave log directory collected by the master.
    pub fn log_dir(&self) -> PathBuf {
        self.config.log_dir.join(self.slave_name)
    }

    /// `config - slave` prefix of every log line of the run.
    pub fn label(&self) -> String {
        format!("{} - {}", self.config.name, self.slave_name)
    }

    /// A command with the toolchain environment applied.
    pub fn command(&self, command: impl Into<String>, args: Vec<impl Into<String>>) -> Runner {
        self.env.apply(Runner::new(command, args))
    }

    pub fn shell(&self, line: impl Into<String>) -> Runner {
        self.env.apply(Runner::shell(line))
    }

    /// Run make in `dir` for the given runtime.
    pub fn make(
        &self,
        dir: &Path,
        targets: &[&str],
        runtime: Runtime,
        timeout: Duration,
    ) -> CommandOutput {
        let mut runner = self
            .command(&self.common().make_command, targets.to_vec())
            .current_dir(dir)
            .timeout(timeout);
        if runtime.is_alternate() {
            runner = runner.env("RT2", "1");
        }
        runner.output()
    }
}

pub fn source_package_name(source_dir_name: &str, config_name: &str) -> String {
    format!("{source_dir_name}-{config_name}.tar.bz2")
}

fn matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(Glob::new(pattern)?.compile_matcher())
}

/// Files directly below `dir` whose name matches `pattern`, sorted.
pub fn find_matching(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = matcher(pattern)?;
    let mut found: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .filter(|entry| matcher.is_match(entry.file_name()))
        .map(|entry| entry.path())
        .collect();
    found.sort();
    Ok(found)
}

/// Unpack every `.tar.bz2` below `dir` matching `pattern` into `dir`.
///
/// Returns the number of packages unpacked.
pub fn unpack_matching(ctx: &PassContext, dir: &Path, pattern: &str) -> usize {
    let packages = match find_matching(dir, pattern) {
        Ok(packages) => packages,
        Err(err) => {
            error!("{} - Failed to look for {pattern} - {err}", ctx.label());
            return 0;
        }
    };
    let mut unpacked = 0;
    for package in packages {
        let output = Runner::new(
            "tar",
            vec![String::from("xjf"), package.display().to_string()],
        )
        .current_dir(dir)
        .timeout(UNPACK_TIMEOUT)
        .output();
        if output.success() {
            unpacked += 1;
        } else {
            error!(
                "{} - Failed to unpack {} - status {}",
                ctx.label(),
                package.display(),
                output.status
            );
        }
    }
    unpacked
}

/// Remove whatever below `dir` matches `pattern`, files and directories.
pub fn remove_matching(dir: &Path, pattern: &str) {
    let Ok(matcher) = matcher(pattern) else {
        return;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|entry| entry.ok()) {
        if !matcher.is_match(entry.file_name()) {
            continue;
        }
        let path = entry.path();
        let removed = if entry.file_type().is_ok_and(|kind| kind.is_dir()) {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(err) = removed {
            warn!("Failed to remove {} - {err}", path.display());
        }
    }
}

/// Keep a tool's output as a log file next to the reports.
pub fn write_log(path: &Path, output: &CommandOutput) {
    let mut content = output.lines().collect::<Vec<&str>>().join("\n");
    content.push('\n');
    if let Err(err) = fs::write(path, content) {
        error!("Failed to write {} - {err}", path.display());
    }
}
