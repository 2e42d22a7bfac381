//! Process execution and file transport for the nightly build harness.
//!
//! Every external tool the harness drives (make, compilers, archivers,
//! remote shells, plotting tools, the mailer) is run through a [`Runner`]:
//! one command line, optional working directory, an environment overlay and
//! an optional timeout. The caller observes the exit status and the captured
//! output lines; a non-zero status is never turned into an error.
//!
//! # Usage
//!
//! ```rust
//! use nb_io::runner::Runner;
//! use std::time::Duration;
//!
//! let output = Runner::new("echo", vec!["Hello, World!"])
//!     .env("LANG", "C")
//!     .timeout(Duration::from_secs(5))
//!     .output();
//!
//! assert!(output.success());
//! assert_eq!(output.stdout, vec!["Hello, World!"]);
//! ```

pub mod output;
pub mod process;
pub mod runner;
pub mod transport;

pub use output::{CommandOutput, SPAWN_FAILURE_STATUS, TIMEOUT_STATUS};
pub use runner::Runner;
pub use transport::{LocalTransport, SecureShellTransport, Transport};
