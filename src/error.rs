//! Error types raised by the scheduler runtime.
//!
//! Payload failures are *not* errors at this level: a panicking payload is
//! contained at the invocation boundary, reported on the event bus, and
//! the task completes normally as far as waiters are concerned. The only
//! runtime error surface is lifecycle management.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the scheduler runtime.
///
/// These represent failures of the runtime itself, such as a shutdown
/// exceeding its grace period, never failures of individual payloads.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Shutdown grace period elapsed before the worker finished its
    /// current task. The worker is left detached; the running payload is
    /// not interrupted.
    #[error("shutdown grace {grace:?} exceeded; worker still busy")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
    },
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use taskserial::SchedulerError;
    ///
    /// let err = SchedulerError::GraceExceeded { grace: Duration::from_secs(5) };
    /// assert_eq!(err.as_label(), "scheduler_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::GraceExceeded { .. } => "scheduler_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SchedulerError::GraceExceeded { grace } => {
                format!("grace exceeded after {grace:?}; worker left detached")
            }
        }
    }
}
