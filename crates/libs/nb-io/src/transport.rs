//! Moving files to build slaves and running commands on them.
//!
//! Two implementations exist: [`LocalTransport`] for slaves that are the
//! master host itself and [`SecureShellTransport`] that goes through
//! `scp`/`ssh`. Both report through [`CommandOutput`] and never fail hard.

use std::{net::IpAddr, path::Path, time::Duration};

use crate::{output::CommandOutput, runner::Runner};

/// Upper bound for a single copy operation.
pub const COPY_TIMEOUT: Duration = Duration::from_secs(3600);

/// File transfer and remote execution towards one slave.
pub trait Transport: Send + Sync {
    /// Human readable destination, used in log lines.
    fn destination(&self) -> String;

    fn is_local(&self) -> bool;

    /// Run `command` through a shell on the slave.
    fn exec(&self, command: &str, timeout: Option<Duration>) -> CommandOutput;

    /// Copy a local file or directory into `remote_dir` on the slave.
    fn copy_to(&self, local: &Path, remote_dir: &str) -> CommandOutput;

    /// Copy the contents of `remote_dir` on the slave into `local_dir`.
    fn copy_from(&self, remote_dir: &str, local_dir: &Path) -> CommandOutput;
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn with_timeout(runner: Runner, timeout: Option<Duration>) -> Runner {
    match timeout {
        Some(timeout) => runner.timeout(timeout),
        None => runner,
    }
}

/// The slave is the machine the master runs on.
#[derive(Debug, Default, Clone)]
pub struct LocalTransport;

impl Transport for LocalTransport {
    fn destination(&self) -> String {
        String::from("localhost")
    }

    fn is_local(&self) -> bool {
        true
    }

    fn exec(&self, command: &str, timeout: Option<Duration>) -> CommandOutput {
        with_timeout(Runner::shell(command), timeout).output()
    }

    fn copy_to(&self, local: &Path, remote_dir: &str) -> CommandOutput {
        Runner::new(
            "cp",
            vec![
                "-r".to_string(),
                local.to_string_lossy().to_string(),
                remote_dir.to_string(),
            ],
        )
        .timeout(COPY_TIMEOUT)
        .output()
    }

    fn copy_from(&self, remote_dir: &str, local_dir: &Path) -> CommandOutput {
        let local_dir = shell_quote(&local_dir.to_string_lossy());
        Runner::shell(format!(
            "mkdir -p {local_dir} && cp -r {}/. {local_dir}",
            shell_quote(remote_dir)
        ))
        .timeout(COPY_TIMEOUT)
        .output()
    }
}

/// A remote slave reached with `ssh` and `scp`.
#[derive(Debug, Clone)]
pub struct SecureShellTransport {
    pub user: String,
    pub host: String,
}

impl SecureShellTransport {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
        }
    }
}

impl Transport for SecureShellTransport {
    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn is_local(&self) -> bool {
        false
    }

    fn exec(&self, command: &str, timeout: Option<Duration>) -> CommandOutput {
        let runner = Runner::new(
            "ssh",
            vec![
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                self.destination(),
                command.to_string(),
            ],
        );
        with_timeout(runner, timeout).output()
    }

    fn copy_to(&self, local: &Path, remote_dir: &str) -> CommandOutput {
        Runner::new(
            "scp",
            vec![
                "-r".to_string(),
                local.to_string_lossy().to_string(),
                format!("{}:{}", self.destination(), remote_dir),
            ],
        )
        .timeout(COPY_TIMEOUT)
        .output()
    }

    fn copy_from(&self, remote_dir: &str, local_dir: &Path) -> CommandOutput {
        if let Err(err) = std::fs::create_dir_all(local_dir) {
            return CommandOutput::synthetic(1, format!("{}: {err}", local_dir.display()));
        }
        // The glob is expanded by the remote shell
        Runner::new(
            "scp",
            vec![
                "-r".to_string(),
                format!("{}:{}/*", self.destination(), remote_dir),
                local_dir.to_string_lossy().to_string(),
            ],
        )
        .timeout(COPY_TIMEOUT)
        .output()
    }
}

/// Host names and addresses under which the current machine is known.
pub fn local_host_names() -> Vec<String> {
    let mut names = vec![String::from("localhost")];
    for args in [vec![], vec!["-i"], vec!["-f"]] {
        let output = Runner::new("hostname", args).output();
        if output.success() {
            names.extend(
                output
                    .stdout
                    .iter()
                    .flat_map(|line| line.split_whitespace())
                    .map(str::to_string),
            );
        }
    }
    names.sort();
    names.dedup();
    names
}

/// Whether `address` designates the local machine.
pub fn is_local_address(address: &str, local_names: &[String]) -> bool {
    if let Ok(ip) = address.parse::<IpAddr>() {
        if ip.is_loopback() {
            return true;
        }
    }
    local_names.iter().any(|name| name == address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_is_local_address() {
        let names = vec!["buildhost".to_string(), "10.0.0.5".to_string()];
        assert!(is_local_address("127.0.0.1", &names));
        assert!(is_local_address("::1", &names));
        assert!(is_local_address("buildhost", &names));
        assert!(is_local_address("10.0.0.5", &names));
        assert!(!is_local_address("10.0.0.6", &names));
    }

    #[test]
    fn test_local_host_names_contains_localhost() {
        assert!(local_host_names().contains(&"localhost".to_string()));
    }

    #[test]
    fn test_secure_shell_destination() {
        let transport = SecureShellTransport::new("build", "slave1");
        assert_eq!(transport.destination(), "build@slave1");
        assert!(!transport.is_local());
    }
}
