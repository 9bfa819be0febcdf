//! # Worker: the single consumer of the task queue.
//!
//! One long-lived worker drains the priority queue and executes one task
//! at a time. This is the sole execution context for queued work, which is
//! what guarantees strict non-concurrency between submitted tasks.
//!
//! ## Drain cycle
//! ```text
//! loop {
//!   ├─► stop if shutdown token cancelled
//!   ├─► pop lowest-key entry (under the state lock)
//!   │     ├─ processing disabled ─► put back at original key, sleep
//!   │     ├─ entry cancelled     ─► mark completed, never invoke
//!   │     └─ runnable            ─► mark current (same lock), then run
//!   └─► queue empty ─► park until a submission signals
//! }
//! ```
//!
//! ## Rules
//! - The state lock is released before the payload runs; payloads may take
//!   arbitrarily long and may call back into the scheduler.
//! - A payload panic is caught at the one place the scheduler invokes
//!   payloads, reported as a `Failed` event, and counts as completion.
//! - The pop and the queued→running handoff happen under one lock
//!   acquisition, so no observer can see a task as neither queued nor
//!   running while it is in flight.
//! - Cancellation is checked at dequeue only; a task that starts running
//!   is never interrupted.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::SystemTime;

use futures::FutureExt;
use tokio::time;

use crate::core::context;
use crate::core::queue::Entry;
use crate::core::scheduler::{HistoryEntry, Shared};
use crate::events::{Event, EventKind};
use crate::tasks::{BoxTaskFuture, Payload, TaskHandle};

/// How a task is being invoked.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    /// Dequeued by the worker: marked as the current task, recorded in
    /// history, and routed to the designated runner if requested.
    Worker,
    /// Inline short-circuit inside an already-running task: never marked
    /// current, executes in the calling context.
    Inline,
}

enum Step {
    Run(Entry),
    Skip(TaskHandle),
    Paused,
    Idle,
}

/// The worker drain loop. Spawned once per scheduler; exits when the
/// shutdown token is cancelled.
pub(crate) async fn run(shared: Arc<Shared>) {
    loop {
        if shared.token.is_cancelled() {
            break;
        }

        let step = {
            let mut queue = shared.queue.lock().unwrap();
            match queue.pop() {
                None => Step::Idle,
                Some(entry) => {
                    if !shared.processing_enabled.load(AtomicOrdering::SeqCst) {
                        queue.requeue(entry);
                        Step::Paused
                    } else if entry.handle.is_cancelled() {
                        Step::Skip(entry.handle)
                    } else {
                        queue.begin_running(entry.handle.clone());
                        Step::Run(entry)
                    }
                }
            }
        };

        match step {
            Step::Run(entry) => {
                run_task(&shared, &entry.handle, entry.payload, RunMode::Worker).await;
            }
            Step::Skip(handle) => {
                handle.mark_completed();
                shared.notify_state.notify_waiters();
            }
            Step::Paused => {
                tokio::select! {
                    _ = shared.token.cancelled() => break,
                    _ = time::sleep(shared.config.pause_poll) => {}
                }
            }
            Step::Idle => {
                let notified = shared.notify_queue.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                // re-check: a submission may have landed before `enable`
                if shared.queue.lock().unwrap().is_heap_empty() {
                    tokio::select! {
                        _ = shared.token.cancelled() => break,
                        _ = notified => {}
                    }
                }
            }
        }
    }
}

/// Executes one task: lifecycle events, timestamps, panic containment.
/// The single point where the scheduler invokes payloads.
pub(crate) async fn run_task(
    shared: &Shared,
    handle: &TaskHandle,
    payload: Payload,
    mode: RunMode,
) {
    handle.mark_running();
    if mode == RunMode::Worker {
        record_history(shared, handle);
    }
    shared
        .bus
        .publish(Event::now(EventKind::Started).with_task(handle.display_info_arc()));

    let work = compose(shared, handle, payload);
    if mode == RunMode::Worker && handle.is_on_designated_thread() {
        shared.designated.run(work).await;
    } else {
        work.await;
    }

    finish(shared, handle, mode);
}

/// Synchronous inline execution of an action payload.
///
/// Only reachable from inside a running task, so the ambient in-task scope
/// is already set and the action runs in the caller's context.
pub(crate) fn run_inline_action(
    shared: &Shared,
    handle: &TaskHandle,
    action: Box<dyn FnOnce() + Send + 'static>,
) {
    handle.mark_running();
    shared
        .bus
        .publish(Event::now(EventKind::Started).with_task(handle.display_info_arc()));

    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(action)) {
        publish_failed(shared, handle, panic.as_ref());
    }

    finish(shared, handle, RunMode::Inline);
}

/// Wraps the payload into a self-contained future: ambient in-task scope
/// plus panic containment and failure reporting. The result is safe to
/// hand to a designated runner as-is.
fn compose(shared: &Shared, handle: &TaskHandle, payload: Payload) -> BoxTaskFuture {
    let bus = shared.bus.clone();
    let label = handle.display_info_arc();
    let fut = payload.run();
    Box::pin(context::enter(shared.id, async move {
        if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
            bus.publish(
                Event::now(EventKind::Failed)
                    .with_task(label)
                    .with_reason(panic_message(panic.as_ref())),
            );
        }
    }))
}

fn finish(shared: &Shared, handle: &TaskHandle, mode: RunMode) {
    // clear the current slot before publishing, so counts taken by
    // subscribers already exclude this task
    if mode == RunMode::Worker {
        shared.queue.lock().unwrap().clear_current();
    }
    handle.mark_completed();
    shared
        .bus
        .publish(Event::now(EventKind::Completed).with_task(handle.display_info_arc()));
    shared.notify_state.notify_waiters();
}

fn publish_failed(shared: &Shared, handle: &TaskHandle, panic: &(dyn Any + Send)) {
    shared.bus.publish(
        Event::now(EventKind::Failed)
            .with_task(handle.display_info_arc())
            .with_reason(panic_message(panic)),
    );
}

fn record_history(shared: &Shared, handle: &TaskHandle) {
    if shared.config.history_limit == 0 {
        return;
    }
    let mut history = shared.history.lock().unwrap();
    history.push_back(HistoryEntry {
        at: SystemTime::now(),
        display_info: handle.display_info_arc(),
    });
    while history.len() > shared.config.history_limit {
        history.pop_front();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "payload panicked".to_string()
    }
}
