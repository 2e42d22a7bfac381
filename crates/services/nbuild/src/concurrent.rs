//! Running independent units of work on scoped threads.

use std::thread;

use tracing::{debug, error};

/// A unit of work that may borrow from the caller.
pub type Job<'a, T> = Box<dyn FnOnce() -> T + Send + 'a>;

/// Run every job on its own thread and wait for all of them.
///
/// Results come back in job order. A job that panicked is logged and
/// yields `None`; the others are unaffected.
pub fn run_all<'a, T: Send + 'a>(jobs: Vec<(String, Job<'a, T>)>) -> Vec<(String, Option<T>)> {
    thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|(name, job)| (name, scope.spawn(job)))
            .collect();
        handles
            .into_iter()
            .map(|(name, handle)| match handle.join() {
                Ok(value) => {
                    debug!("Thread for {name} joined successfully");
                    (name, Some(value))
                }
                Err(err) => {
                    error!("{name} - Failed to join thread - {err:?}");
                    (name, None)
                }
            })
            .collect()
    })
}
