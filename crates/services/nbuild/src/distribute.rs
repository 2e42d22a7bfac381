//! Shipping a prepared configuration to its slaves and bringing the logs
//! back.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::Duration,
};

use chrono::NaiveDateTime;
use nb_config::{BuildConfig, Catalog, Slave, TestSelection};
use nb_io::{
    LocalTransport, Runner, SecureShellTransport, Transport,
    transport::{is_local_address, shell_quote},
};
use tracing::{debug, error, info, warn};

use crate::{
    passes::{find_matching, product},
    prelude::*,
};

/// Name of the harness binary next to the sources on the slave.
pub const HARNESS_BINARY: &str = "nbuild";
/// Name of the shipped catalog on the slave.
pub const HARNESS_CATALOG: &str = "nightly.toml";
/// Harness log of the slave role, relocated into its log directory.
pub const HARNESS_LOG: &str = "nbuild.log";

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const SLAVE_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);
const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Local transport for slaves that are this machine, `ssh` otherwise.
pub fn transport_for(slave: &Slave, local_names: &[String]) -> Box<dyn Transport> {
    if slave.local || is_local_address(&slave.address, local_names) {
        Box::new(LocalTransport)
    } else {
        Box::new(SecureShellTransport::new(&slave.user, &slave.address))
    }
}

/// The harness itself, as shipped to every slave.
#[derive(Debug, Clone)]
pub struct HarnessFiles {
    pub binary: PathBuf,
    pub catalog: PathBuf,
}

/// Everything needed to run one configuration on its slaves.
pub struct Distribution<'a> {
    pub catalog: &'a Catalog,
    pub config: &'a BuildConfig,
    pub source_package: &'a Path,
    pub harness: &'a HarnessFiles,
    pub tests: Option<&'a TestSelection>,
    /// Serializes building the product package across configurations.
    pub product_lock: &'a Mutex<()>,
}

impl Distribution<'_> {
    fn label(&self, slave: &Slave) -> String {
        format!("{} - {}", self.config.name, slave.name)
    }

    /// Reset the slave's directories, ship the packages and the harness, then
    /// run the slave role remotely.
    ///
    /// Returns whether the slave role was started at all.
    pub fn run_on(&self, slave: &Slave, transport: &dyn Transport) -> bool {
        let label = self.label(slave);
        let build_dir = self.config.build_dir.display().to_string();
        let log_dir = self.config.log_dir.display().to_string();
        info!("{label} - Distributing to {}", transport.destination());

        let reset = transport.exec(
            &format!(
                "rm -rf {build} {log} && mkdir -p {build} {log}",
                build = shell_quote(&build_dir),
                log = shell_quote(&log_dir)
            ),
            Some(CLEANUP_TIMEOUT),
        );
        if !reset.success() {
            error!("{label} - Failed to reset the slave directories - status {}", reset.status);
        }

        if self.config.perftest {
            match &self.config.perftest_package {
                Some(package) if package.is_file() => {
                    self.ship(&label, transport, package, &build_dir);
                }
                _ => error!("{label} - The performance test package cannot be found"),
            }
        }
        if self.config.vobtest {
            match self.product_package() {
                Ok(package) => {
                    self.ship(&label, transport, &package, &build_dir);
                }
                Err(err) => error!("{label} - Failed to prepare the product package - {err}"),
            }
        }

        let files: [&Path; 3] = [self.source_package, &self.harness.binary, &self.harness.catalog];
        for file in files {
            if !self.ship(&label, transport, file, &build_dir) {
                error!("{label} - Giving up on this slave");
                return false;
            }
        }

        let invoked = transport.exec(&self.slave_command(slave), Some(SLAVE_TIMEOUT));
        if invoked.success() {
            info!("{label} - Slave finished");
        } else {
            error!("{label} - Slave exited with status {}", invoked.status);
        }
        true
    }

    fn ship(&self, label: &str, transport: &dyn Transport, file: &Path, remote_dir: &str) -> bool {
        let copied = transport.copy_to(file, remote_dir);
        if !copied.success() {
            error!(
                "{label} - Failed to copy {} to {} - status {}",
                file.display(),
                transport.destination(),
                copied.status
            );
        }
        copied.success()
    }

    pub fn slave_command(&self, slave: &Slave) -> String {
        let mut command = format!(
            "cd {} && ./{HARNESS_BINARY} --catalog {HARNESS_CATALOG} --log-file {HARNESS_LOG} slave -s {} -c {}",
            shell_quote(&self.config.build_dir.display().to_string()),
            shell_quote(&slave.name),
            shell_quote(&self.config.name)
        );
        if let Some(tests) = self.tests {
            command.push_str(&format!(" -t {}", tests.letters()));
        }
        command
    }

    /// Copy the slave's log directory into the master's log tree.
    pub fn collect(&self, slave: &Slave, transport: &dyn Transport, destination: &Path) -> bool {
        let label = self.label(slave);
        let source = self.config.log_dir.join(&slave.name).display().to_string();
        let copied = transport.copy_from(&source, destination);
        if copied.success() {
            debug!("{label} - Logs collected into {}", destination.display());
        } else {
            error!("{label} - Failed to collect the logs - status {}", copied.status);
        }
        copied.success()
    }

    /// The product package shared by every configuration of the cycle,
    /// built by whichever configuration needs it first.
    fn product_package(&self) -> Result<PathBuf> {
        let _guard = self
            .product_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        build_product_package(self.catalog, nb_report::pass::now())
    }
}

/// `vobtest-YYYYMMDD.tar.bz2` in the master's build directory.
pub fn build_product_package(catalog: &Catalog, now: NaiveDateTime) -> Result<PathBuf> {
    let common = &catalog.common;
    let build_dir = &common.build_dir;
    if let Some(existing) = find_matching(build_dir, product::PACKAGE_PATTERN)?.pop() {
        debug!("{} is already prepared", existing.display());
        return Ok(existing);
    }

    let staging = build_dir.join(product::PACKAGE_DIR);
    let collected =
        product::collect_products(&catalog.products, &common.product_source_dir, &staging)?;
    info!("{collected} products collected");
    let package = build_dir.join(format!("vobtest-{}.tar.bz2", now.format("%Y%m%d")));
    let archived = Runner::new(
        "tar",
        vec![
            String::from("cjf"),
            package.display().to_string(),
            String::from(product::PACKAGE_DIR),
        ],
    )
    .current_dir(build_dir)
    .timeout(ARCHIVE_TIMEOUT)
    .output();
    if let Err(err) = fs::remove_dir_all(&staging) {
        warn!("Failed to remove {} - {err}", staging.display());
    }
    if !archived.success() {
        return Err(Error::Package {
            config: String::from(product::PACKAGE_DIR),
            status: archived.status,
        });
    }
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::catalog;

    fn harness(root: &Path) -> HarnessFiles {
        HarnessFiles {
            binary: root.join("bin/nbuild"),
            catalog: root.join("master/build/nightly.toml"),
        }
    }

    #[test]
    fn test_transport_choice() {
        let catalog = catalog("/tmp/nb");
        let mut slave = catalog.slaves["lab1"].clone();
        assert!(transport_for(&slave, &[]).is_local());

        slave.local = false;
        slave.address = String::from("10.0.0.7");
        assert!(!transport_for(&slave, &[String::from("lab0")]).is_local());
        assert_eq!(transport_for(&slave, &[]).destination(), "build@10.0.0.7");
        assert!(transport_for(&slave, &[String::from("10.0.0.7")]).is_local());
    }

    #[test]
    fn test_slave_command() {
        let catalog = catalog("/tmp/nb");
        let config = &catalog.configs["linux_gcc"];
        let harness = harness(Path::new("/tmp/nb"));
        let lock = Mutex::new(());
        let tests: TestSelection = "rf".parse().expect("Valid selection");
        let distribution = Distribution {
            catalog: &catalog,
            config,
            source_package: Path::new("/tmp/nb/master/build/linux_gcc/TTCNv3-linux_gcc.tar.bz2"),
            harness: &harness,
            tests: Some(&tests),
            product_lock: &lock,
        };
        assert_eq!(
            distribution.slave_command(&catalog.slaves["lab1"]),
            "cd '/tmp/nb/build' && ./nbuild --catalog nightly.toml --log-file nbuild.log \
             slave -s 'lab1' -c 'linux_gcc' -t rf"
        );
    }

    #[test]
    fn test_missing_source_package_gives_up() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        let config = &catalog.configs["linux_gcc"];
        let harness = harness(dir.path());
        let lock = Mutex::new(());
        let distribution = Distribution {
            catalog: &catalog,
            config,
            source_package: &dir.path().join("missing.tar.bz2"),
            harness: &harness,
            tests: None,
            product_lock: &lock,
        };

        assert!(!distribution.run_on(&catalog.slaves["lab1"], &LocalTransport));
        assert!(config.build_dir.is_dir());
        assert!(config.log_dir.is_dir());
    }

    #[test]
    fn test_existing_product_package_is_reused() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        fs::create_dir_all(&catalog.common.build_dir).expect("Couldn't create build dir");
        let existing = catalog.common.build_dir.join("vobtest-20261015.tar.bz2");
        fs::write(&existing, "").expect("Couldn't write package");

        let package = build_product_package(&catalog, nb_report::pass::now()).expect("No package");
        assert_eq!(package, existing);
    }
}
