//! High-level process runner with event handling.

use std::{
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
    sync::mpsc::{Sender, channel},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::{
    output::{CommandOutput, SPAWN_FAILURE_STATUS, TIMEOUT_STATUS},
    process::{
        ProcessStatus, SpawnOptions, capture_exit_status, exit_code, get_process_status,
        spawn_process, stop_child,
    },
};

/// Events emitted during process execution.
#[derive(Debug, PartialEq)]
pub enum RunEvent {
    /// Process creation failed with error message.
    ProcessCreationFailed(String),
    /// Process was successfully created.
    ProcessCreated,
    /// Process ended (true = success, false = failure).
    ProcessEnd(bool),
    /// New stdout line from the process.
    ProcessNewOutputLine(String),
    /// New stderr line from the process.
    ProcessNewErrorLine(String),
    /// The timeout expired and the process group was killed.
    ProcessTimedOut,
}

/// High-level process runner with event-driven output handling.
///
/// A runner describes one command invocation: the command line, an optional
/// working directory, an environment overlay, an optional timeout and an
/// optional stdin payload. Running it never fails; problems are reported
/// through the exit status.
#[derive(Debug, Clone)]
pub struct Runner {
    /// Command to execute.
    command: String,
    /// Command line arguments.
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
    timeout: Option<Duration>,
    stdin: Option<String>,
}

impl Runner {
    /// Create a new runner with command and arguments.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nb_io::runner::Runner;
    ///
    /// let runner = Runner::new("ls", vec!["-la", "/tmp"]);
    /// ```
    pub fn new(command: impl Into<String>, args: Vec<impl Into<String>>) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(|a| a.into()).collect(),
            working_dir: None,
            envs: Vec::new(),
            timeout: None,
            stdin: None,
        }
    }

    /// Create a runner that hands `line` to `sh -c`.
    ///
    /// ```rust
    /// use nb_io::runner::Runner;
    ///
    /// let output = Runner::shell("echo one && echo two").output();
    /// assert_eq!(output.stdout, vec!["one", "two"]);
    /// ```
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new("sh", vec!["-c".to_string(), line.into()])
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Feed `input` to the process on stdin, then close it.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Get the full command string with arguments.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nb_io::runner::Runner;
    ///
    /// let runner = Runner::new("ls", vec!["-la"]);
    /// assert_eq!(runner.get_full_command(), "ls -la");
    /// ```
    pub fn get_full_command(&self) -> String {
        if self.args.is_empty() {
            return self.command.clone();
        }
        format!("{} {}", &self.command, &self.args.join(" "))
    }

    fn read_stream<T: Read>(tx: Sender<RunEvent>, stream: T, event: fn(String) -> RunEvent) {
        let mut reader = BufReader::new(stream);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer);
                    let line = line.trim_end_matches(['\n', '\r']);
                    let _ = tx.send(event(line.to_string()));
                }
                Err(_) => break,
            }
        }
    }

    fn launch_stream_reader<T>(
        tx: Sender<RunEvent>,
        stream: T,
        event: fn(String) -> RunEvent,
    ) -> JoinHandle<()>
    where
        T: Read + Send + 'static,
    {
        thread::spawn(move || Runner::read_stream(tx, stream, event))
    }

    /// Run the process with event monitoring.
    ///
    /// Starts the process and monitors its execution, sending events via the
    /// provided channel. Reads stdout and stderr line by line until the
    /// process finishes or its timeout expires.
    ///
    /// Returns the numeric exit status (see [`CommandOutput::status`]).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nb_io::runner::{Runner, RunEvent};
    /// use std::sync::mpsc;
    ///
    /// let runner = Runner::new("echo", vec!["Hello"]);
    /// let (tx, rx) = mpsc::channel();
    ///
    /// let status = runner.run(tx);
    /// assert_eq!(status, 0);
    /// ```
    pub fn run(&self, tx: Sender<RunEvent>) -> i32 {
        debug!("Running `{}`", self.get_full_command());
        let options = SpawnOptions {
            working_dir: self.working_dir.as_deref(),
            envs: &self.envs,
            piped_stdin: self.stdin.is_some(),
        };
        let mut process = match spawn_process(&self.command, &self.args, &options) {
            Ok(process) => process,
            Err(err) => {
                warn!("Failed to start `{}` - {:?}", self.get_full_command(), err);
                let _ = tx.send(RunEvent::ProcessCreationFailed(format!("{:?}", err)));
                let _ = tx.send(RunEvent::ProcessEnd(false));
                return SPAWN_FAILURE_STATUS;
            }
        };

        let _ = tx.send(RunEvent::ProcessCreated);

        let stdin_thread = match (process.stdin.take(), self.stdin.clone()) {
            (Some(mut stdin), Some(input)) => Some(thread::spawn(move || {
                let _ = stdin.write_all(input.as_bytes());
            })),
            _ => None,
        };
        let stdout_thread = process.stdout.take().map(|stdout| {
            Runner::launch_stream_reader(tx.clone(), stdout, RunEvent::ProcessNewOutputLine)
        });
        let stderr_thread = process.stderr.take().map(|stderr| {
            Runner::launch_stream_reader(tx.clone(), stderr, RunEvent::ProcessNewErrorLine)
        });

        let started = Instant::now();
        // Loop until the process ends or the deadline passes
        let status = loop {
            let expired = self
                .timeout
                .is_some_and(|timeout| started.elapsed() >= timeout);
            if expired {
                warn!(
                    "`{}` timed out after {:?}",
                    self.get_full_command(),
                    self.timeout.unwrap_or_default()
                );
                let _ = tx.send(RunEvent::ProcessTimedOut);
                let _ = stop_child(&mut process);
                let _ = capture_exit_status(&mut process);
                break TIMEOUT_STATUS;
            }
            match get_process_status(&mut process) {
                Err(_) => {
                    let _ = stop_child(&mut process);
                    break SPAWN_FAILURE_STATUS;
                }
                Ok(ProcessStatus::Done(status)) => break exit_code(status),
                Ok(ProcessStatus::Running) => {}
            };
        };

        for handle in [stdin_thread, stdout_thread, stderr_thread]
            .into_iter()
            .flatten()
        {
            let _ = handle.join();
        }

        let _ = tx.send(RunEvent::ProcessEnd(status == 0));
        status
    }

    /// Run the process to completion and collect its output.
    pub fn output(&self) -> CommandOutput {
        let (tx, rx) = channel();
        let status = self.run(tx);
        let mut output = CommandOutput {
            status,
            ..Default::default()
        };
        for event in rx.try_iter() {
            match event {
                RunEvent::ProcessNewOutputLine(line) => output.stdout.push(line),
                RunEvent::ProcessNewErrorLine(line) => output.stderr.push(line),
                RunEvent::ProcessCreationFailed(err) => output.stderr.push(err),
                RunEvent::ProcessTimedOut => output
                    .stderr
                    .push(format!("timed out: {}", self.get_full_command())),
                RunEvent::ProcessCreated | RunEvent::ProcessEnd(_) => {}
            }
        }
        output
    }
}
