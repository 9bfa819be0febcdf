//! # Task submission spec: label, priority band, thread placement.
//!
//! [`TaskSpec`] bundles everything a caller declares about a unit of work
//! *besides* its payload: a human-readable label (also the dedup key for
//! [`ExecutionPreference::AddOrMoveToEnd`]), the execution-priority band,
//! and whether the payload must run on the designated thread.
//!
//! A spec can be created:
//! - **Explicitly** with [`TaskSpec::new`] plus `with_*` builders
//! - **From a label** via `From<&str>` / `From<String>` (defaults apply)
//!
//! ## Example
//! ```rust
//! use taskserial::{ExecutionPreference, TaskSpec};
//!
//! let spec = TaskSpec::new("restart on file change")
//!     .with_preference(ExecutionPreference::AddOrMoveToEnd);
//!
//! assert_eq!(spec.display_info(), "restart on file change");
//! assert_eq!(spec.preference(), ExecutionPreference::AddOrMoveToEnd);
//! assert!(!spec.is_on_designated_thread());
//! ```

use std::fmt;
use std::sync::Arc;

/// When a submitted task should run relative to already-queued work.
///
/// Each preference maps to a disjoint numeric band of the priority key
/// space; within a band, submission order is preserved. Lower bands drain
/// first, so every queued `Asap` task runs before any queued `Fifo` task,
/// which runs before any queued `AddOrMoveToEnd` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPreference {
    /// Jump ahead of all pending `Fifo` and `AddOrMoveToEnd` work.
    Asap,
    /// Run in submission order after earlier `Fifo` work. The default.
    #[default]
    Fifo,
    /// Run last; if a live queued task already carries the same label,
    /// cancel it and let this submission take its place at the end.
    AddOrMoveToEnd,
}

impl ExecutionPreference {
    /// Width of one priority band.
    pub(crate) const BAND: u64 = u64::MAX / 3;

    /// First priority key of this preference's band.
    pub(crate) fn band_base(self) -> u64 {
        match self {
            ExecutionPreference::Asap => 0,
            ExecutionPreference::Fifo => Self::BAND,
            ExecutionPreference::AddOrMoveToEnd => 2 * Self::BAND,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutionPreference::Asap => "asap",
            ExecutionPreference::Fifo => "fifo",
            ExecutionPreference::AddOrMoveToEnd => "add_or_move_to_end",
        }
    }
}

impl fmt::Display for ExecutionPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Declarative half of a task submission.
///
/// The label is free-form and not required to be unique; it is shown in
/// progress reporting and doubles as the dedup key for
/// [`ExecutionPreference::AddOrMoveToEnd`].
#[derive(Clone, Debug)]
pub struct TaskSpec {
    display_info: Arc<str>,
    preference: ExecutionPreference,
    on_designated_thread: bool,
}

impl TaskSpec {
    /// Creates a spec with the given label, `Fifo` preference, and no
    /// designated-thread requirement.
    pub fn new(display_info: impl Into<Arc<str>>) -> Self {
        Self {
            display_info: display_info.into(),
            preference: ExecutionPreference::default(),
            on_designated_thread: false,
        }
    }

    /// Returns a new spec with the given execution preference.
    #[must_use]
    pub fn with_preference(mut self, preference: ExecutionPreference) -> Self {
        self.preference = preference;
        self
    }

    /// Returns a new spec whose payload must run on the designated thread.
    ///
    /// The scheduler forwards such payloads to the configured
    /// [`DesignatedRunner`](crate::DesignatedRunner) instead of executing
    /// them on the worker.
    #[must_use]
    pub fn on_designated_thread(mut self) -> Self {
        self.on_designated_thread = true;
        self
    }

    /// The human-readable label.
    pub fn display_info(&self) -> &str {
        &self.display_info
    }

    pub(crate) fn display_info_arc(&self) -> Arc<str> {
        Arc::clone(&self.display_info)
    }

    /// The execution preference.
    pub fn preference(&self) -> ExecutionPreference {
        self.preference
    }

    /// Whether the payload must run on the designated thread.
    pub fn is_on_designated_thread(&self) -> bool {
        self.on_designated_thread
    }
}

impl From<&str> for TaskSpec {
    fn from(display_info: &str) -> Self {
        TaskSpec::new(display_info)
    }
}

impl From<String> for TaskSpec {
    fn from(display_info: String) -> Self {
        TaskSpec::new(display_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_disjoint_and_ordered() {
        let asap = ExecutionPreference::Asap.band_base();
        let fifo = ExecutionPreference::Fifo.band_base();
        let amte = ExecutionPreference::AddOrMoveToEnd.band_base();

        assert!(asap < fifo);
        assert!(fifo < amte);
        assert_eq!(fifo - asap, ExecutionPreference::BAND);
        assert_eq!(amte - fifo, ExecutionPreference::BAND);
    }

    #[test]
    fn spec_from_label_uses_defaults() {
        let spec = TaskSpec::from("generate code");
        assert_eq!(spec.display_info(), "generate code");
        assert_eq!(spec.preference(), ExecutionPreference::Fifo);
        assert!(!spec.is_on_designated_thread());
    }
}
