//! Environment the slave passes run the installed toolchain with.

use std::path::Path;

use nb_config::BuildConfig;
use nb_io::Runner;

/// Variables overlaid on every command a pass runs.
///
/// The harness's own process environment is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainEnv {
    vars: Vec<(String, String)>,
}

fn prefixed(prefixes: &[String], current: Option<String>) -> String {
    let mut parts = prefixes.to_vec();
    parts.push(current.unwrap_or_default());
    parts.join(":")
}

impl ToolchainEnv {
    /// Build the overlay from the configuration and the current values of
    /// `PATH` and `LD_LIBRARY_PATH`.
    pub fn new(config: &BuildConfig) -> Self {
        Self::with_base(
            config,
            std::env::var("PATH").ok(),
            std::env::var("LD_LIBRARY_PATH").ok(),
        )
    }

    fn with_base(config: &BuildConfig, path: Option<String>, library_path: Option<String>) -> Self {
        let install = config.install_dir.display().to_string();
        let under = |root: &Path, dir: &str| root.join(dir).display().to_string();

        let mut bin = vec![under(&config.install_dir, "bin")];
        let mut lib = vec![under(&config.install_dir, "lib")];
        if let Some(gcc_dir) = &config.gcc_dir {
            bin.push(under(gcc_dir, "bin"));
            lib.push(under(gcc_dir, "lib"));
        }

        let mut vars = vec![
            (String::from("PATH"), prefixed(&bin, path)),
            (String::from("LD_LIBRARY_PATH"), prefixed(&lib, library_path)),
            (String::from("TTCN3_DIR"), install),
        ];
        if let Some(license) = &config.license {
            vars.push((
                String::from("TTCN3_LICENSE_FILE"),
                license.display().to_string(),
            ));
        }
        Self { vars }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Attach the overlay to `runner`.
    pub fn apply(&self, runner: Runner) -> Runner {
        runner.envs(self.vars.iter().cloned())
    }
}
