//! The configuration catalog: everything the harness knows before a cycle.

use std::{collections::BTreeMap, path::Path, sync::LazyLock};

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    build_config::{BuildConfig, TestSelection},
    common::CommonConfig,
    prelude::*,
    recipients::{Recipients, parse_recipients, validate_recipients},
    slave::{ProductDescriptor, Slave},
};

static SELECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+(,\w+)*$").expect("Valid regex"));

/// Catalog as written by the user in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCatalog {
    pub common: CommonConfig,
    #[serde(default)]
    pub recipients: Recipients,
    #[serde(default)]
    pub slaves: BTreeMap<String, Slave>,
    #[serde(default)]
    pub configs: BTreeMap<String, BuildConfig>,
    /// Product kind to the products of that kind.
    #[serde(default)]
    pub products: BTreeMap<String, Vec<ProductDescriptor>>,
}

impl UserCatalog {
    /// Load the catalog from a TOML file.
    pub fn from_file(file_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(file_path)?;
        Self::from_toml(&contents)
    }

    /// Parse the catalog from a TOML string.
    pub fn from_toml(value: &str) -> Result<Self> {
        Ok(toml::from_str(value)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

impl From<&Catalog> for UserCatalog {
    fn from(catalog: &Catalog) -> Self {
        Self {
            common: catalog.common.clone(),
            recipients: catalog.recipients.clone(),
            slaves: catalog.slaves.clone(),
            configs: catalog.configs.clone(),
            products: catalog.products.clone(),
        }
    }
}

/// Validated catalog.
///
/// Names are filled in from the table keys and malformed recipients are
/// gone. The catalog is only changed by command line overrides before a
/// cycle starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub common: CommonConfig,
    pub recipients: Recipients,
    pub slaves: BTreeMap<String, Slave>,
    pub configs: BTreeMap<String, BuildConfig>,
    pub products: BTreeMap<String, Vec<ProductDescriptor>>,
}

impl Catalog {
    /// Validate a user catalog.
    pub fn from_user_catalog(catalog: UserCatalog) -> Result<Self> {
        let mut configs = catalog.configs;
        for (name, config) in configs.iter_mut() {
            config.name = name.clone();
            config.validate()?;
        }
        let mut slaves = catalog.slaves;
        for (name, slave) in slaves.iter_mut() {
            slave.name = name.clone();
            for config in slave.configs.iter() {
                if !configs.contains_key(config) {
                    warn!("Slave {name} lists unknown configuration {config}");
                }
            }
        }
        Ok(Self {
            common: catalog.common,
            recipients: validate_recipients(catalog.recipients),
            slaves,
            configs,
            products: catalog.products,
        })
    }

    pub fn from_file(file_path: &Path) -> Result<Self> {
        Self::from_user_catalog(UserCatalog::from_file(file_path)?)
    }

    pub fn from_toml(value: &str) -> Result<Self> {
        Self::from_user_catalog(UserCatalog::from_toml(value)?)
    }

    /// Write the catalog, overrides included, so that slaves see the same
    /// configurations as the master.
    pub fn write_file(&self, file_path: &Path) -> Result<()> {
        std::fs::write(file_path, UserCatalog::from(self).to_toml()?)?;
        Ok(())
    }

    pub fn config(&self, name: &str) -> Option<&BuildConfig> {
        self.configs.get(name)
    }

    /// Whether at least one slave builds `config_name`.
    pub fn is_configuration_used(&self, config_name: &str) -> bool {
        self.slaves
            .values()
            .any(|slave| slave.configs.iter().any(|c| c == config_name))
    }

    /// Slaves that build `config_name`, in catalog order.
    pub fn slaves_for(&self, config_name: &str) -> Vec<&Slave> {
        self.slaves
            .values()
            .filter(|slave| slave.configs.iter().any(|c| c == config_name))
            .collect()
    }

    /// Resolve a comma separated configuration list.
    ///
    /// `None` selects every configuration. Unknown names are logged and
    /// skipped; duplicates are dropped. Ending up with nothing is an error.
    pub fn select_configurations(&self, list: Option<&str>) -> Result<Vec<String>> {
        let selected: Vec<String> = match list {
            None => {
                warn!("No configurations selected, building all of them");
                self.configs.keys().cloned().collect()
            }
            Some(list) => {
                if !SELECTION.is_match(list) {
                    return Err(Error::InvalidSelection(list.to_string()));
                }
                let mut selected: Vec<String> = Vec::new();
                for name in list.split(',') {
                    if !self.configs.contains_key(name) {
                        error!("Configuration {name} is not in the catalog, skipping it");
                        continue;
                    }
                    if !selected.iter().any(|s| s == name) {
                        selected.push(name.to_string());
                    }
                }
                selected
            }
        };
        if selected.is_empty() {
            return Err(Error::NoValidConfigurations);
        }
        Ok(selected)
    }

    /// Replace the recipients with the ones given on the command line.
    pub fn override_recipients(&mut self, raw: &str) {
        self.recipients = parse_recipients(raw);
        info!("Recipients overridden, {} remain", self.recipients.len());
    }

    /// Enable exactly the passes in `selection` for the named configurations.
    pub fn apply_tests(&mut self, config_names: &[String], selection: &TestSelection) {
        for name in config_names {
            if let Some(config) = self.configs.get_mut(name) {
                config.apply_tests(selection);
            }
        }
    }

    /// Apply the FOA install directory rewrite to every configuration.
    pub fn rewrite_foa(&mut self, now: NaiveDateTime) {
        let source_dir_name = self.common.source_dir_name.clone();
        for config in self.configs.values_mut() {
            config.rewrite_for_foa(&source_dir_name, now);
        }
    }

    /// `name address` per recipient.
    pub fn dump_recipients(&self) -> Vec<String> {
        self.recipients
            .iter()
            .map(|(name, address)| format!("{name} {address}"))
            .collect()
    }

    /// `config slave, slave` per configuration.
    pub fn dump_configurations(&self) -> Vec<String> {
        self.configs
            .keys()
            .map(|name| {
                let slaves: Vec<&str> = self
                    .slaves_for(name)
                    .into_iter()
                    .map(|slave| slave.name.as_str())
                    .collect();
                format!("{name} {}", slaves.join(", "))
            })
            .collect()
    }
}
