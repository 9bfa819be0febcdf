//! # taskserial
//!
//! **Taskserial** is a serialized task-queue runtime for Rust.
//!
//! It owns one logical mutation timeline for shared in-memory state:
//! callers on any thread submit labeled units of work with a priority
//! hint, and a single worker drains a priority-ordered queue, executing
//! exactly one task at a time. The crate is designed as the scheduling
//! core of tools that must serialize every change to a shared model
//! (project editors, asset pipelines) across UI handlers, file watchers,
//! and network-driven commands.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  callers (UI thread, watcher threads, network handlers)
//!      │ add / add_or_run / add_async (label, preference, payload)
//!      ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Scheduler                                                    │
//! │  - TaskQueue (priority heap: asap < fifo < add_or_move_to_end,│
//! │    FIFO within each band, dedup-by-label for move-to-end)     │
//! │  - Bus (broadcast events)                                     │
//! │  - SubscriberSet (fans out to user subscribers)               │
//! │  - history ring, counters, processing-enabled switch         │
//! └──────────────┬────────────────────────────────────────────────┘
//!                ▼
//!        ┌──────────────┐     payload panics contained here,
//!        │    worker    │──►  reported as Failed events
//!        │ (one at a    │
//!        │  time, ever) │──►  designated-thread payloads handed to
//!        └──────────────┘     the DesignatedRunner collaborator
//! ```
//!
//! ### Task lifecycle
//! ```text
//! submit ──► Queued ──► Running ──► Completed
//!               │                      ▲
//!               └── cancelled, skipped ┘   (payload never invoked)
//!
//! already inside a task + add_or_run ──► runs inline immediately,
//!                                        handle returned complete
//! ```
//!
//! ## Guarantees
//! - **Mutual exclusion**: no two queued payloads ever execute
//!   concurrently; the worker is the only consumer.
//! - **FIFO within band**: same-preference tasks run in submission order.
//! - **Band priority**: every queued `Asap` task runs before any queued
//!   `Fifo` task, which runs before any queued `AddOrMoveToEnd` task.
//! - **Dedup by label**: an `AddOrMoveToEnd` submission cancels and
//!   replaces a live queued task with the same label.
//! - **Reentrancy without deadlock**: code already running inside a task
//!   can `add_or_run` nested work inline instead of enqueueing it.
//! - **Panic containment**: payload panics are caught at the invocation
//!   boundary, published as [`EventKind::Failed`], and the task completes
//!   normally for waiters.
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                    |
//! |-------------------|-----------------------------------------------------------|---------------------------------------|
//! | **Submission**    | Actions, value-returning functions, futures.              | [`Scheduler`], [`TaskSpec`]           |
//! | **Priorities**    | Three bands with FIFO inside each.                        | [`ExecutionPreference`]               |
//! | **Handles**       | Cancel, inspect state, read timestamps, await values.     | [`TaskHandle`], [`TypedTaskHandle`]   |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, UI status). | [`Subscribe`], [`SubscriberSet`]      |
//! | **Thread seam**   | Payloads that must run on one designated thread.          | [`DesignatedRunner`], [`InlineRunner`]|
//! | **Errors**        | Typed lifecycle errors.                                   | [`SchedulerError`]                    |
//! | **Configuration** | Centralized runtime settings.                             | [`Config`]                            |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use taskserial::{Config, ExecutionPreference, Scheduler, TaskSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = Scheduler::builder(Config::default()).build();
//!
//!     // plain serialized action
//!     let saved = scheduler.add("save project", || {
//!         // mutate shared project state
//!     });
//!
//!     // value-returning work, awaited
//!     let count = scheduler
//!         .add_async_value("count entities", || 42usize)
//!         .await;
//!     assert_eq!(count, Some(42));
//!
//!     // coalescing recurring work: keep only the newest restart request
//!     scheduler.add(
//!         TaskSpec::new("restart on file change")
//!             .with_preference(ExecutionPreference::AddOrMoveToEnd),
//!         || { /* restart */ },
//!     );
//!
//!     scheduler.wait_for(&saved).await;
//!     scheduler.wait_for_all_tasks_finished().await;
//!     scheduler.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{Config, DesignatedRunner, HistoryEntry, InlineRunner, Scheduler, SchedulerBuilder};
pub use error::SchedulerError;
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    BoxTaskFuture, ExecutionPreference, TaskHandle, TaskSpec, TaskState, TypedTaskHandle,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
