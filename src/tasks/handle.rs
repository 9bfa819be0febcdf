//! # Task handles: caller-facing view of a submitted unit of work.
//!
//! A [`TaskHandle`] is the value returned by every submission API. It is a
//! cheap clone of shared task state: label, preference, cancellation flag,
//! lifecycle state, and diagnostic timestamps. The scheduler and the
//! caller see the same state through their respective clones.
//!
//! ## Lifecycle
//! ```text
//! Queued ──► Running ──► Completed
//!    │                      ▲
//!    └── cancelled, skipped ┘    (payload never invoked)
//! ```
//! No transition leaves `Completed`, and no handle is ever reused.
//!
//! [`TypedTaskHandle<T>`] additionally owns the result slot for
//! value-bearing payloads; the slot is populated before the task is marked
//! complete, so a waiter that observes completion can take the value.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::tasks::spec::{ExecutionPreference, TaskSpec};

/// Lifecycle state of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in the queue (or about to be handed to the worker).
    Queued,
    /// Payload currently executing (worker, inline, or designated thread).
    Running,
    /// Terminal: payload finished, panicked, or was skipped as cancelled.
    Completed,
}

const STATE_QUEUED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_COMPLETED: u8 = 2;

struct TaskInner {
    display_info: Arc<str>,
    preference: ExecutionPreference,
    on_designated_thread: bool,
    cancelled: AtomicBool,
    state: AtomicU8,
    time_started: Mutex<Option<SystemTime>>,
    time_ended: Mutex<Option<SystemTime>>,
}

/// Shared handle to one submitted task.
///
/// Clones refer to the same task. A handle never resurrects: once
/// [`TaskHandle::state`] reports [`TaskState::Completed`] it stays there.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskInner>,
}

impl TaskHandle {
    pub(crate) fn new(spec: &TaskSpec) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                display_info: spec.display_info_arc(),
                preference: spec.preference(),
                on_designated_thread: spec.is_on_designated_thread(),
                cancelled: AtomicBool::new(false),
                state: AtomicU8::new(STATE_QUEUED),
                time_started: Mutex::new(None),
                time_ended: Mutex::new(None),
            }),
        }
    }

    /// The human-readable label this task was submitted with.
    pub fn display_info(&self) -> &str {
        &self.inner.display_info
    }

    pub(crate) fn display_info_arc(&self) -> Arc<str> {
        Arc::clone(&self.inner.display_info)
    }

    /// The execution preference this task was submitted with.
    pub fn preference(&self) -> ExecutionPreference {
        self.inner.preference
    }

    pub(crate) fn is_on_designated_thread(&self) -> bool {
        self.inner.on_designated_thread
    }

    /// Requests cancellation. Cooperative and queue-time only: a task that
    /// is still queued will be skipped; a task already running is not
    /// interrupted.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, AtomicOrdering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(AtomicOrdering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        match self.inner.state.load(AtomicOrdering::SeqCst) {
            STATE_QUEUED => TaskState::Queued,
            STATE_RUNNING => TaskState::Running,
            _ => TaskState::Completed,
        }
    }

    /// Whether the task reached its terminal state.
    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// When the payload started executing, if it has. Diagnostics only.
    pub fn time_started(&self) -> Option<SystemTime> {
        *self.inner.time_started.lock().unwrap()
    }

    /// When the payload finished executing, if it has. Diagnostics only.
    pub fn time_ended(&self) -> Option<SystemTime> {
        *self.inner.time_ended.lock().unwrap()
    }

    pub(crate) fn mark_running(&self) {
        self.inner
            .state
            .store(STATE_RUNNING, AtomicOrdering::SeqCst);
        *self.inner.time_started.lock().unwrap() = Some(SystemTime::now());
    }

    pub(crate) fn mark_completed(&self) {
        if self.state() == TaskState::Running {
            *self.inner.time_ended.lock().unwrap() = Some(SystemTime::now());
        }
        self.inner
            .state
            .store(STATE_COMPLETED, AtomicOrdering::SeqCst);
    }

    pub(crate) fn ptr_eq(&self, other: &TaskHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("display_info", &self.display_info())
            .field("preference", &self.preference())
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Handle to a task whose payload produces a value.
///
/// Dereferences to [`TaskHandle`] for cancellation and state inspection.
/// The value is moved out of the slot by
/// [`Scheduler::wait_for_value`](crate::Scheduler::wait_for_value); it is
/// `None` if the payload panicked or the value was already taken.
pub struct TypedTaskHandle<T> {
    handle: TaskHandle,
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> TypedTaskHandle<T> {
    pub(crate) fn new(handle: TaskHandle, slot: Arc<Mutex<Option<T>>>) -> Self {
        Self { handle, slot }
    }

    /// The untyped handle.
    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    pub(crate) fn take_result(&self) -> Option<T> {
        self.slot.lock().unwrap().take()
    }
}

impl<T> Clone for TypedTaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Deref for TypedTaskHandle<T> {
    type Target = TaskHandle;

    fn deref(&self) -> &TaskHandle {
        &self.handle
    }
}
