//! Captured outcome of one external command.

/// Exit status reported when the command timed out and was killed.
pub const TIMEOUT_STATUS: i32 = 124;

/// Exit status reported when the command could not be started or observed.
pub const SPAWN_FAILURE_STATUS: i32 = 127;

/// Exit status and output lines of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `128 + signal`, [`TIMEOUT_STATUS`] or [`SPAWN_FAILURE_STATUS`].
    pub status: i32,
    /// Lines written to stdout, without line terminators.
    pub stdout: Vec<String>,
    /// Lines written to stderr, without line terminators.
    pub stderr: Vec<String>,
}

impl CommandOutput {
    /// An output that was never produced by a process, e.g. a precondition
    /// that failed before anything could be started.
    pub fn synthetic(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            stdout: Vec::new(),
            stderr: vec![message.into()],
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn timed_out(&self) -> bool {
        self.status == TIMEOUT_STATUS
    }

    /// All stdout lines followed by all stderr lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .iter()
            .chain(self.stderr.iter())
            .map(String::as_str)
    }

    /// The last `count` lines of [`CommandOutput::lines`].
    pub fn tail(&self, count: usize) -> Vec<&str> {
        let total = self.stdout.len() + self.stderr.len();
        self.lines().skip(total.saturating_sub(count)).collect()
    }
}
