//! # Task types: submission specs, handles, payloads.
//!
//! This module provides the task-facing data model:
//! - [`TaskSpec`] - label, priority band, and thread-placement declaration
//! - [`ExecutionPreference`] - the three priority bands
//! - [`TaskHandle`] / [`TypedTaskHandle`] - caller-facing task state
//! - [`TaskState`] - the `Queued -> Running -> Completed` lifecycle

mod handle;
mod payload;
mod spec;

pub use handle::{TaskHandle, TaskState, TypedTaskHandle};
pub use payload::BoxTaskFuture;
pub use spec::{ExecutionPreference, TaskSpec};

pub(crate) use payload::Payload;
