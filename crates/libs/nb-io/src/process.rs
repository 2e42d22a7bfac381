//! Low-level process management utilities.

use std::{
    ffi::OsStr,
    io,
    os::unix::process::{CommandExt, ExitStatusExt},
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread::sleep,
    time::Duration,
};

/// Errors that can occur during process operations.
#[derive(Debug)]
pub enum ProcessError {
    /// Failed to wait for child process.
    WaitChildFail,
    /// Failed to spawn the process.
    SpawnProcessFail(io::Error),
}

/// Current status of a running process.
pub enum ProcessStatus {
    /// Process has completed with exit status.
    Done(ExitStatus),
    /// Process is still running.
    Running,
}

/// Everything besides the command line that shapes a spawned process.
#[derive(Debug, Default)]
pub struct SpawnOptions<'a> {
    /// Working directory, inherited when `None`.
    pub working_dir: Option<&'a Path>,
    /// Variables added on top of the inherited environment.
    pub envs: &'a [(String, String)],
    /// Whether stdin should be piped instead of closed.
    pub piped_stdin: bool,
}

/// Spawn a new process with piped stdout and stderr.
///
/// The child becomes the leader of a new process group so that [`stop_child`]
/// can take down everything it started, not only the direct child.
///
/// # Examples
///
/// ```rust
/// use nb_io::process::{SpawnOptions, spawn_process};
///
/// let mut child = spawn_process("echo", &["Hello".to_string()], &SpawnOptions::default()).unwrap();
/// let output = child.stdout.take().unwrap();
/// ```
pub fn spawn_process(
    cmd: &str,
    args: &[String],
    options: &SpawnOptions,
) -> Result<Child, ProcessError> {
    let mut command = Command::new(OsStr::new(cmd));
    command
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if options.piped_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .process_group(0);
    if let Some(dir) = options.working_dir {
        command.current_dir(dir);
    }
    command.envs(options.envs.iter().map(|(key, value)| (key, value)));
    command.spawn().map_err(ProcessError::SpawnProcessFail)
}

/// Check process status without blocking.
///
/// Includes a small sleep to prevent excessive CPU usage when called in a loop.
pub fn get_process_status(child: &mut Child) -> Result<ProcessStatus, ProcessError> {
    match child.try_wait() {
        Ok(Some(exit_status)) => Ok(ProcessStatus::Done(exit_status)),
        Ok(None) => {
            sleep(Duration::from_millis(10));
            Ok(ProcessStatus::Running)
        }
        Err(_) => Err(ProcessError::WaitChildFail),
    }
}

/// Terminate a child process together with its process group.
pub fn stop_child(child: &mut Child) -> Result<(), io::Error> {
    let group = format!("-{}", child.id());
    let _ = Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match child.kill() {
        Err(err) if err.kind() != io::ErrorKind::InvalidInput => Err(err),
        _ => Ok(()),
    }
}

/// Wait for the child process to complete and return its exit status.
pub fn capture_exit_status(child: &mut Child) -> Result<ExitStatus, io::Error> {
    child.wait()
}

/// Numeric form of an exit status: the exit code, or `128 + signal` for a
/// process killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    }
}
