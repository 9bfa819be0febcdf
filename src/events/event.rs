//! # Scheduler events emitted on every task-state transition.
//!
//! The [`EventKind`] enum classifies the lifecycle of a submitted task
//! (queued, moved to end, started, completed, failed) plus scheduler-level
//! signals (shutdown requested, untasked-call diagnostics). The [`Event`]
//! struct carries optional metadata: task label, execution preference, and
//! a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use taskserial::{Event, EventKind, ExecutionPreference};
//!
//! let ev = Event::now(EventKind::Queued)
//!     .with_task("save project")
//!     .with_preference(ExecutionPreference::Fifo);
//!
//! assert_eq!(ev.kind, EventKind::Queued);
//! assert_eq!(ev.task.as_deref(), Some("save project"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::tasks::ExecutionPreference;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of scheduler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Task entered the queue.
    ///
    /// Sets:
    /// - `task`: task label
    /// - `preference`: execution preference
    Queued,

    /// Task entered the queue, cancelling and replacing an earlier queued
    /// task with the same label (`AddOrMoveToEnd` dedup).
    ///
    /// Sets:
    /// - `task`: task label
    /// - `preference`: execution preference
    MovedToEnd,

    /// Payload began executing.
    ///
    /// Sets:
    /// - `task`: task label
    Started,

    /// Task reached its terminal state (payload finished or panicked).
    ///
    /// Sets:
    /// - `task`: task label
    Completed,

    /// Payload panicked. Published in addition to `Completed`; the panic
    /// never escapes the scheduler.
    ///
    /// Sets:
    /// - `task`: task label
    /// - `reason`: panic message
    Failed,

    /// Code expected to run inside a task was called from outside one.
    ///
    /// Sets:
    /// - `reason`: caller-supplied context
    UntaskedCall,

    /// Scheduler shutdown was requested; no further queued work will run.
    ShutdownRequested,
}

/// Scheduler event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Label of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Execution preference of the task, if applicable.
    pub preference: Option<ExecutionPreference>,
    /// Human-readable reason (panic message, diagnostic context).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp
    /// and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            preference: None,
            reason: None,
        }
    }

    /// Attaches a task label.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an execution preference.
    #[inline]
    pub fn with_preference(mut self, preference: ExecutionPreference) -> Self {
        self.preference = Some(preference);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
