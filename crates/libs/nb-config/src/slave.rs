//! Build slaves and the products the product pass knows about.

use serde::{Deserialize, Serialize};

/// A machine that builds and tests configurations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slave {
    /// Filled in from the catalog key.
    #[serde(skip)]
    pub name: String,
    /// Host name or IP address.
    pub address: String,
    /// Remote user.
    pub user: String,
    /// Names of the configurations this slave builds.
    #[serde(default)]
    pub configs: Vec<String>,
    /// Force the local transport regardless of the address.
    #[serde(default)]
    pub local: bool,
}

/// One step the product pass can take with a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductAction {
    /// Semantic analysis only.
    Semantic,
    /// Full translation to C++.
    Translate,
    /// Translation, makefile generation and compilation.
    Compile,
    /// Compilation followed by execution of the product's tests.
    Run,
}

impl ProductAction {
    pub const ALL: [ProductAction; 4] = [
        ProductAction::Semantic,
        ProductAction::Translate,
        ProductAction::Compile,
        ProductAction::Run,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductAction::Semantic => "semantic",
            ProductAction::Translate => "translate",
            ProductAction::Compile => "compile",
            ProductAction::Run => "run",
        }
    }
}

/// A product under `[[products.<kind>]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    pub name: String,
    #[serde(default)]
    pub semantic: bool,
    #[serde(default)]
    pub translate: bool,
    #[serde(default)]
    pub compile: bool,
    #[serde(default)]
    pub run: bool,
}

impl ProductDescriptor {
    pub fn is_enabled(&self, action: ProductAction) -> bool {
        match action {
            ProductAction::Semantic => self.semantic,
            ProductAction::Translate => self.translate,
            ProductAction::Compile => self.compile,
            ProductAction::Run => self.run,
        }
    }
}
