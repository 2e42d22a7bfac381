//! Configuration catalog for the nightly build harness.
//!
//! The catalog is a TOML file with five sections: `[common]` settings,
//! `[recipients]` of the report, `[slaves.<name>]`, `[configs.<name>]` and
//! `[products]` for the product pass.
//!
//! # Usage
//!
//! ```rust
//! use nb_config::Catalog;
//!
//! let catalog = Catalog::from_toml(r#"
//!     [common]
//!     build_dir = "/home/build/nightly"
//!     log_dir = "/home/build/nightly/logs"
//!     html_dir = "/var/www/nightly"
//!
//!     [slaves.lab1]
//!     address = "10.0.0.7"
//!     user = "build"
//!     configs = ["linux_gcc"]
//!
//!     [configs.linux_gcc]
//!     platform = "LINUX"
//!     build_dir = "/home/build/slave"
//!     install_dir = "/home/build/install"
//!     log_dir = "/home/build/slave/logs"
//! "#).unwrap();
//!
//! assert!(catalog.is_configuration_used("linux_gcc"));
//! ```

pub mod build_config;
pub mod catalog;
pub mod common;
pub mod error;
pub mod prelude;
pub mod recipients;
pub mod slave;

pub use build_config::{BuildConfig, SourceVersion, TestSelection};
pub use catalog::{Catalog, UserCatalog};
pub use common::CommonConfig;
pub use slave::{ProductAction, ProductDescriptor, Slave};
