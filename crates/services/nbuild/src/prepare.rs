//! Check out, patch and package the sources of one configuration.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use nb_config::{BuildConfig, Catalog, SourceVersion, common::CheckoutCommands};
use nb_io::Runner;
use tracing::{error, info};

use crate::{passes::{source_package_name, write_log}, patch, prelude::*};

const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);
const PACKAGE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// The shell command retrieving `version`.
pub fn checkout_command(commands: &CheckoutCommands, version: &SourceVersion) -> String {
    match version {
        SourceVersion::Head => commands.head.clone(),
        SourceVersion::Tag(version) => commands.tag.replace("{version}", version),
        SourceVersion::Date(version) => commands.date.replace("{version}", version),
    }
}

/// Produce `<build_dir>/<source>-<config>.tar.bz2`, ready to be shipped.
///
/// The sources come from the checkout commands, or from `source_path` when
/// an existing tree is to be used. The unpacked tree is removed afterwards.
pub fn prepare_source(
    catalog: &Catalog,
    config: &BuildConfig,
    build_dir: &Path,
    log_dir: &Path,
    source_path: Option<&Path>,
) -> Result<PathBuf> {
    let common = &catalog.common;
    let source_dir = build_dir.join(&common.source_dir_name);
    fs::create_dir_all(build_dir)?;
    fs::create_dir_all(log_dir)?;

    let retrieved = match source_path {
        Some(path) => {
            info!("{} - Copying the sources from {}", config.name, path.display());
            Runner::new(
                "cp",
                vec![
                    String::from("-r"),
                    path.display().to_string(),
                    source_dir.display().to_string(),
                ],
            )
            .timeout(CHECKOUT_TIMEOUT)
            .output()
        }
        None => {
            let command = checkout_command(&common.checkout, &config.source_version());
            info!("{} - Checking out the sources with `{command}`", config.name);
            let output = Runner::shell(command)
                .current_dir(build_dir)
                .timeout(CHECKOUT_TIMEOUT)
                .output();
            keep_checkout_logs(log_dir, &config.name, &output);
            output
        }
    };
    if !retrieved.success() {
        error!("{} - Retrieving the sources failed - status {}", config.name, retrieved.status);
        return Err(Error::Checkout {
            config: config.name.clone(),
            status: retrieved.status,
        });
    }

    patch::configure(config, &source_dir)?;

    let package = build_dir.join(source_package_name(&common.source_dir_name, &config.name));
    let packed = Runner::new(
        "tar",
        vec![
            String::from("cjf"),
            package.display().to_string(),
            common.source_dir_name.clone(),
        ],
    )
    .current_dir(build_dir)
    .timeout(PACKAGE_TIMEOUT)
    .output();
    if !packed.success() {
        return Err(Error::Package {
            config: config.name.clone(),
            status: packed.status,
        });
    }
    fs::remove_dir_all(&source_dir)?;
    info!("{} - Source package {} is ready", config.name, package.display());
    Ok(package)
}

fn keep_checkout_logs(log_dir: &Path, config_name: &str, output: &nb_io::CommandOutput) {
    let stdout = nb_io::CommandOutput {
        stderr: Vec::new(),
        ..output.clone()
    };
    let stderr = nb_io::CommandOutput {
        stdout: Vec::new(),
        ..output.clone()
    };
    write_log(&log_dir.join(format!("checkout-{config_name}.stdout")), &stdout);
    write_log(&log_dir.join(format!("checkout-{config_name}.stderr")), &stderr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::catalog;

    #[test]
    fn test_checkout_commands() {
        let commands = CheckoutCommands {
            head: String::from("git clone repo TTCNv3"),
            tag: String::from("git clone -b {version} repo TTCNv3"),
            date: String::from("checkout --date {version}"),
        };
        assert_eq!(checkout_command(&commands, &SourceVersion::Head), "git clone repo TTCNv3");
        assert_eq!(
            checkout_command(&commands, &SourceVersion::Tag(String::from("v1-9-pl0"))),
            "git clone -b v1-9-pl0 repo TTCNv3"
        );
        assert_eq!(
            checkout_command(&commands, &SourceVersion::Date(String::from("20261015"))),
            "checkout --date 20261015"
        );
    }

    #[test]
    fn test_failed_checkout_is_logged() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let mut catalog = catalog(dir.path());
        catalog.common.checkout.head = String::from("echo fetching; echo denied >&2; exit 3");
        let config = catalog.configs["linux_gcc"].clone();
        let build_dir = dir.path().join("master/build/linux_gcc");
        let log_dir = dir.path().join("master/logs/linux_gcc");

        let result = prepare_source(&catalog, &config, &build_dir, &log_dir, None);
        assert!(matches!(result, Err(Error::Checkout { status: 3, .. })));
        assert_eq!(
            fs::read_to_string(log_dir.join("checkout-linux_gcc.stdout")).expect("No log"),
            "fetching\n"
        );
        assert_eq!(
            fs::read_to_string(log_dir.join("checkout-linux_gcc.stderr")).expect("No log"),
            "denied\n"
        );
    }

    #[test]
    fn test_copied_tree_without_build_file() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        let config = catalog.configs["linux_gcc"].clone();
        let tree = dir.path().join("tree");
        fs::create_dir_all(&tree).expect("Couldn't create tree");
        let build_dir = dir.path().join("master/build/linux_gcc");

        let result = prepare_source(
            &catalog,
            &config,
            &build_dir,
            &dir.path().join("master/logs/linux_gcc"),
            Some(&tree),
        );
        assert!(matches!(result, Err(Error::MissingBuildFile(_))));
        assert!(build_dir.join("TTCNv3").is_dir());
    }
}
