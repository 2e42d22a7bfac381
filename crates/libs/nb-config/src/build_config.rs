//! A single build configuration: toolchain, feature flags and enabled passes.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
};

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::prelude::*;

/// Directory, next to the link, that holds the real FOA installations.
pub const FOA_BUILDS_DIR: &str = "temporary_foa_builds";

static TAG_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v\d-\d-pl\d$").expect("Valid regex"));
static DATE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^2\d{7}$").expect("Valid regex"));

/// Which state of the sources a configuration is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceVersion {
    Head,
    Tag(String),
    Date(String),
}

/// Build configuration as found in the catalog under `[configs.<name>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Filled in from the catalog key.
    #[serde(skip)]
    pub name: String,
    /// Platform identifier understood by the build system, e.g. `LINUX`.
    pub platform: String,
    /// Empty for head, `vN-N-plN` for a tag, `2YYYYMMDD` for a date.
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub license: Option<PathBuf>,

    #[serde(default)]
    pub gcc_dir: Option<PathBuf>,
    #[serde(default)]
    pub cc: Option<String>,
    #[serde(default)]
    pub cxx: Option<String>,
    #[serde(default)]
    pub flex: Option<String>,
    #[serde(default)]
    pub bison: Option<String>,
    #[serde(default)]
    pub jdk_dir: Option<String>,
    #[serde(default)]
    pub qt_dir: Option<String>,
    #[serde(default)]
    pub xml_dir: Option<String>,
    #[serde(default)]
    pub openssl_dir: Option<String>,
    #[serde(default)]
    pub ldflags: Option<String>,
    #[serde(default)]
    pub compiler_flags: Option<String>,
    #[serde(default)]
    pub perl: Option<PathBuf>,

    #[serde(default)]
    pub gui: bool,
    #[serde(default)]
    pub jni: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "enabled")]
    pub xsd_tests: bool,

    #[serde(default)]
    pub regtest: bool,
    #[serde(default)]
    pub perftest: bool,
    #[serde(default)]
    pub functest: bool,
    #[serde(default)]
    pub vobtest: bool,
    #[serde(default)]
    pub eclipse: bool,
    /// Also run every test pass with the alternate runtime.
    #[serde(default)]
    pub alternate_runtime: bool,

    /// Directory with prebuilt documentation.
    #[serde(default)]
    pub pdf_dir: Option<PathBuf>,
    /// Package with the performance test sources.
    #[serde(default)]
    pub perftest_package: Option<PathBuf>,
    #[serde(default = "default_cps_min")]
    pub cps_min: u32,
    #[serde(default = "default_cps_max")]
    pub cps_max: u32,

    /// Scratch space on the slave.
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
    /// Where the slave keeps its reports and logs.
    pub log_dir: PathBuf,

    /// Keep a stable link pointing to the last good installation.
    #[serde(default)]
    pub foa: bool,
    #[serde(default)]
    pub foa_dir: Option<PathBuf>,

    /// Count this configuration in the commitment score.
    #[serde(default)]
    pub measure: bool,
    /// Keep the per-product logs of the product pass.
    #[serde(default)]
    pub product_logs: bool,
}

fn enabled() -> bool {
    true
}

fn default_cps_min() -> u32 {
    1000
}

fn default_cps_max() -> u32 {
    2000
}

impl BuildConfig {
    /// Check the fields every pass relies on.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidConfiguration {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.build_dir.as_os_str().is_empty() {
            return Err(invalid("build_dir is empty"));
        }
        if self.install_dir.as_os_str().is_empty() {
            return Err(invalid("install_dir is empty"));
        }
        if self.log_dir.as_os_str().is_empty() {
            return Err(invalid("log_dir is empty"));
        }
        if self.cps_min > self.cps_max {
            return Err(invalid("cps_min is larger than cps_max"));
        }
        if self.foa && self.foa_dir.is_none() && self.install_dir.parent().is_none() {
            return Err(invalid("FOA requested without a usable install_dir"));
        }
        Ok(())
    }

    pub fn source_version(&self) -> SourceVersion {
        let version = self.version.trim();
        if version.is_empty() {
            SourceVersion::Head
        } else if TAG_VERSION.is_match(version) {
            SourceVersion::Tag(version.to_string())
        } else if DATE_VERSION.is_match(version) {
            SourceVersion::Date(version.to_string())
        } else {
            warn!(
                "{} - Unrecognised version `{version}`, building head",
                self.name
            );
            SourceVersion::Head
        }
    }

    /// Whether any pass besides Build is enabled.
    pub fn has_test_passes(&self) -> bool {
        self.regtest || self.perftest || self.functest || self.vobtest || self.eclipse
    }

    /// Redirect the installation of an FOA configuration without an
    /// explicit link location: the old install directory becomes the link
    /// and the build goes into a fresh timestamped directory next to it.
    ///
    /// Returns whether anything changed.
    pub fn rewrite_for_foa(&mut self, source_dir_name: &str, now: NaiveDateTime) -> bool {
        if !self.foa || self.foa_dir.is_some() {
            return false;
        }
        let link = self.install_dir.clone();
        let parent = link.parent().unwrap_or(Path::new("/")).to_path_buf();
        self.install_dir = parent.join(FOA_BUILDS_DIR).join(format!(
            "{source_dir_name}-{}",
            now.format("%Y%m%d_%H%M%S")
        ));
        info!(
            "{} - FOA installation moved to {}, link at {}",
            self.name,
            self.install_dir.display(),
            link.display()
        );
        self.foa_dir = Some(link);
        true
    }

    /// Enable exactly the passes named in `selection`.
    pub fn apply_tests(&mut self, selection: &TestSelection) {
        self.regtest = selection.regression;
        self.perftest = selection.performance;
        self.functest = selection.function;
        self.vobtest = selection.product;
        self.eclipse = selection.plugin;
    }
}

/// Test passes requested on the command line, one letter each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestSelection {
    pub regression: bool,
    pub performance: bool,
    pub function: bool,
    pub product: bool,
    pub plugin: bool,
}

impl TestSelection {
    /// Letters in the order they are printed back.
    pub fn letters(&self) -> String {
        [
            (self.regression, 'r'),
            (self.performance, 'p'),
            (self.function, 'f'),
            (self.product, 'v'),
            (self.plugin, 'e'),
        ]
        .into_iter()
        .filter_map(|(on, letter)| on.then_some(letter))
        .collect()
    }
}

impl FromStr for TestSelection {
    type Err = Error;

    fn from_str(letters: &str) -> Result<Self> {
        let mut selection = TestSelection::default();
        for letter in letters.chars() {
            match letter {
                'r' => selection.regression = true,
                'p' => selection.performance = true,
                'f' => selection.function = true,
                'v' => selection.product = true,
                'e' => selection.plugin = true,
                other => return Err(Error::InvalidTestLetter(other)),
            }
        }
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn config() -> BuildConfig {
        toml::from_str::<BuildConfig>(
            r#"
            platform = "LINUX"
            build_dir = "/home/build/nightly"
            install_dir = "/opt/ttcn3/current"
            log_dir = "/home/build/logs"
            "#,
        )
        .expect("Valid configuration")
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.cps_min, 1000);
        assert_eq!(config.cps_max, 2000);
        assert!(config.xsd_tests);
        assert!(!config.has_test_passes());
        assert_eq!(config.source_version(), SourceVersion::Head);
    }

    #[test]
    fn test_source_version() {
        let mut config = config();
        config.version = "v1-8-pl5".into();
        assert_eq!(config.source_version(), SourceVersion::Tag("v1-8-pl5".into()));
        config.version = "20261015".into();
        assert_eq!(config.source_version(), SourceVersion::Date("20261015".into()));
        config.version = "yesterday".into();
        assert_eq!(config.source_version(), SourceVersion::Head);
    }

    #[test]
    fn test_foa_rewrite() {
        let mut config = config();
        config.foa = true;
        let now = NaiveDate::from_ymd_opt(2026, 10, 16)
            .and_then(|d| d.and_hms_opt(2, 30, 5))
            .expect("Valid date");
        assert!(config.rewrite_for_foa("TTCNv3", now));
        assert_eq!(config.foa_dir, Some(PathBuf::from("/opt/ttcn3/current")));
        assert_eq!(
            config.install_dir,
            PathBuf::from("/opt/ttcn3/temporary_foa_builds/TTCNv3-20261016_023005")
        );
        // Second application is a no-op
        assert!(!config.rewrite_for_foa("TTCNv3", now));
    }

    #[test]
    fn test_validate_rejects_inverted_cps_range() {
        let mut config = config();
        config.cps_min = 3000;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_selection_letters() {
        let selection: TestSelection = "fr".parse().expect("Valid letters");
        assert!(selection.regression && selection.function);
        assert!(!selection.performance && !selection.product && !selection.plugin);
        assert_eq!(selection.letters(), "rf");
        assert!(matches!(
            "rx".parse::<TestSelection>(),
            Err(Error::InvalidTestLetter('x'))
        ));

        let mut config = config();
        config.perftest = true;
        config.apply_tests(&selection);
        assert!(config.regtest && config.functest && !config.perftest);
    }
}
