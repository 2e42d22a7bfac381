//! Catalog fixtures shared by the unit tests.

use std::path::Path;

use nb_config::{BuildConfig, Catalog};

/// A catalog whose directories all live below `root`.
pub fn catalog(root: impl AsRef<Path>) -> Catalog {
    let root = root.as_ref().display();
    Catalog::from_toml(&format!(
        r#"
[common]
build_dir = "{root}/master/build"
log_dir = "{root}/master/logs"
html_dir = "{root}/html"
product_source_dir = "{root}/products"
holidays = []

[recipients]
"Night Owl" = "<owl@example.com>"

[slaves.lab1]
address = "127.0.0.1"
user = "build"
configs = ["linux_gcc"]
local = true

[configs.linux_gcc]
platform = "LINUX"
cxx = "g++"
regtest = true
functest = true
measure = true
build_dir = "{root}/build"
install_dir = "{root}/install"
log_dir = "{root}/logs"

[[products.TestPorts]]
name = "SIPmsg"
semantic = true
"#
    ))
    .expect("Valid test catalog")
}

pub fn config(root: impl AsRef<Path>) -> BuildConfig {
    catalog(root).configs["linux_gcc"].clone()
}
