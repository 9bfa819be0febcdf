//! # Scheduler: the serialized mutation timeline.
//!
//! [`Scheduler`] owns one priority-ordered queue and one worker. Callers
//! submit labeled units of work; the worker runs them strictly one at a
//! time, so everything submitted through the queue is serialized against
//! everything else submitted through the queue.
//!
//! ## Submission families
//! ```text
//! add / add_value / add_future / add_future_value
//!     unconditional enqueue; returns a handle immediately, never runs
//!     inline, even when called from inside a running task
//!
//! add_or_run / add_or_run_value / add_or_run_future / add_or_run_future_value
//!     inline short-circuit: when the caller is already inside a task of
//!     this scheduler (and the preference is not AddOrMoveToEnd), the
//!     payload runs immediately in the calling context and the returned
//!     handle is already complete; otherwise identical to add
//!
//! add_async / add_async_value / add_async_future / add_async_future_value
//!     submit via the or-run path, then await completion; the typed
//!     variants yield the payload's value
//! ```
//!
//! The inline short-circuit is what lets deeply nested helper code demand
//! "must not race with other mutations" without deadlocking when it is
//! itself already called from within a task.
//!
//! ## Waiting
//! Waits are signal-based: every task-state transition notifies, and the
//! waiters re-check their condition. No polling interval, no lost wakeups.
//!
//! ## Known limitation
//! No timeouts are enforced: a payload that never returns hangs the worker
//! indefinitely, and a subsequent [`Scheduler::shutdown`] will report
//! [`SchedulerError::GraceExceeded`].

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::builder::SchedulerBuilder;
use crate::core::config::Config;
use crate::core::context;
use crate::core::designated::DesignatedRunner;
use crate::core::queue::TaskQueue;
use crate::core::worker::{self, RunMode};
use crate::error::SchedulerError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{ExecutionPreference, Payload, TaskHandle, TaskSpec, TypedTaskHandle};

/// One record in the started-task history ring.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    /// When the task started.
    pub at: SystemTime,
    /// The task's label.
    pub display_info: Arc<str>,
}

/// State shared between the scheduler facade, the worker, and parallel
/// task closures.
pub(crate) struct Shared {
    pub(crate) id: u64,
    pub(crate) config: Config,
    pub(crate) queue: Mutex<TaskQueue>,
    pub(crate) history: Mutex<VecDeque<HistoryEntry>>,
    pub(crate) processing_enabled: AtomicBool,
    pub(crate) closed: AtomicBool,
    pub(crate) bus: Bus,
    pub(crate) designated: Arc<dyn DesignatedRunner>,
    /// Signalled on every submission; parks the idle worker.
    pub(crate) notify_queue: Notify,
    /// Signalled on every task-state transition; parks waiters.
    pub(crate) notify_state: Notify,
    pub(crate) token: CancellationToken,
}

/// Serialized task queue with one worker, three priority bands, inline
/// reentrancy, and signal-based waiting.
///
/// Constructed via [`Scheduler::builder`]; returned as an `Arc` so that
/// payloads can hold a reference back to the scheduler that runs them.
pub struct Scheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Starts building a scheduler with the given configuration.
    pub fn builder(config: Config) -> SchedulerBuilder {
        SchedulerBuilder::new(config)
    }

    pub(crate) fn from_parts(shared: Arc<Shared>, worker: JoinHandle<()>) -> Self {
        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    // ---- submission: unconditional enqueue ----

    /// Enqueues an action. Never blocks and never runs inline, even when
    /// called from inside another running task.
    ///
    /// The task is visible to queue-inspection APIs before this returns.
    pub fn add(
        &self,
        spec: impl Into<TaskSpec>,
        action: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        let handle = TaskHandle::new(&spec.into());
        self.add_internal(handle.clone(), Payload::from_action(action));
        handle
    }

    /// Enqueues a value-returning function. The value lands in the typed
    /// handle and is retrieved with [`Scheduler::wait_for_value`].
    pub fn add_value<T, F>(&self, spec: impl Into<TaskSpec>, f: F) -> TypedTaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let handle = TaskHandle::new(&spec.into());
        let slot = Arc::new(Mutex::new(None));
        let typed = TypedTaskHandle::new(handle.clone(), Arc::clone(&slot));
        self.add_internal(
            handle,
            Payload::from_action(move || {
                *slot.lock().unwrap() = Some(f());
            }),
        );
        typed
    }

    /// Enqueues a future factory. The future is created when the task
    /// actually runs, not at submission time.
    pub fn add_future<F, Fut>(&self, spec: impl Into<TaskSpec>, f: F) -> TaskHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = TaskHandle::new(&spec.into());
        self.add_internal(handle.clone(), Payload::from_future(f));
        handle
    }

    /// Enqueues a value-returning future factory.
    pub fn add_future_value<T, F, Fut>(&self, spec: impl Into<TaskSpec>, f: F) -> TypedTaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let handle = TaskHandle::new(&spec.into());
        let slot = Arc::new(Mutex::new(None));
        let typed = TypedTaskHandle::new(handle.clone(), Arc::clone(&slot));
        self.add_internal(
            handle,
            Payload::from_future(move || async move {
                let value = f().await;
                *slot.lock().unwrap() = Some(value);
            }),
        );
        typed
    }

    // ---- submission: inline short-circuit ----

    /// Runs the action immediately when already inside a task of this
    /// scheduler (unless the preference is `AddOrMoveToEnd`); enqueues
    /// like [`Scheduler::add`] otherwise.
    ///
    /// Inline execution is not marked as the globally current task, so
    /// progress reporting keeps showing the outer task.
    pub fn add_or_run(
        &self,
        spec: impl Into<TaskSpec>,
        action: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        let spec = spec.into();
        if self.should_run_inline(&spec) {
            let handle = TaskHandle::new(&spec);
            worker::run_inline_action(&self.shared, &handle, Box::new(action));
            handle
        } else {
            self.add(spec, action)
        }
    }

    /// Value-returning form of [`Scheduler::add_or_run`]. When run inline,
    /// the value is already in the handle on return.
    pub fn add_or_run_value<T, F>(&self, spec: impl Into<TaskSpec>, f: F) -> TypedTaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let spec = spec.into();
        if self.should_run_inline(&spec) {
            let handle = TaskHandle::new(&spec);
            let slot = Arc::new(Mutex::new(None));
            let typed = TypedTaskHandle::new(handle.clone(), Arc::clone(&slot));
            worker::run_inline_action(
                &self.shared,
                &handle,
                Box::new(move || {
                    *slot.lock().unwrap() = Some(f());
                }),
            );
            typed
        } else {
            self.add_value(spec, f)
        }
    }

    /// Future form of [`Scheduler::add_or_run`]: awaits the payload in the
    /// calling context when inline, enqueues otherwise.
    pub async fn add_or_run_future<F, Fut>(&self, spec: impl Into<TaskSpec>, f: F) -> TaskHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let spec = spec.into();
        if self.should_run_inline(&spec) {
            let handle = TaskHandle::new(&spec);
            worker::run_task(
                &self.shared,
                &handle,
                Payload::from_future(f),
                RunMode::Inline,
            )
            .await;
            handle
        } else {
            self.add_future(spec, f)
        }
    }

    /// Value-returning future form of [`Scheduler::add_or_run`].
    pub async fn add_or_run_future_value<T, F, Fut>(
        &self,
        spec: impl Into<TaskSpec>,
        f: F,
    ) -> TypedTaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let spec = spec.into();
        if self.should_run_inline(&spec) {
            let handle = TaskHandle::new(&spec);
            let slot = Arc::new(Mutex::new(None));
            let typed = TypedTaskHandle::new(handle.clone(), Arc::clone(&slot));
            worker::run_task(
                &self.shared,
                &handle,
                Payload::from_future(move || async move {
                    let value = f().await;
                    *slot.lock().unwrap() = Some(value);
                }),
                RunMode::Inline,
            )
            .await;
            typed
        } else {
            self.add_future_value(spec, f)
        }
    }

    // ---- submission: submit and await completion ----

    /// Submits via [`Scheduler::add_or_run`] and waits for completion.
    pub async fn add_async(&self, spec: impl Into<TaskSpec>, action: impl FnOnce() + Send + 'static) {
        let handle = self.add_or_run(spec, action);
        self.wait_for(&handle).await;
    }

    /// Submits via [`Scheduler::add_or_run_value`] and waits for the
    /// value. `None` if the payload panicked.
    pub async fn add_async_value<T, F>(&self, spec: impl Into<TaskSpec>, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let typed = self.add_or_run_value(spec, f);
        self.wait_for_value(&typed).await
    }

    /// Submits via [`Scheduler::add_or_run_future`] and waits for
    /// completion.
    pub async fn add_async_future<F, Fut>(&self, spec: impl Into<TaskSpec>, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = self.add_or_run_future(spec, f).await;
        self.wait_for(&handle).await;
    }

    /// Submits via [`Scheduler::add_or_run_future_value`] and waits for
    /// the value. `None` if the payload panicked.
    pub async fn add_async_future_value<T, F, Fut>(
        &self,
        spec: impl Into<TaskSpec>,
        f: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let typed = self.add_or_run_future_value(spec, f).await;
        self.wait_for_value(&typed).await
    }

    /// Runs a blocking action concurrently with everything else, outside
    /// the serialized timeline. Tracked for counting and inspection only;
    /// no ordering guarantees apply.
    #[deprecated(note = "parallel tasks bypass the serialized timeline; prefer add")]
    pub fn add_parallel(
        &self,
        spec: impl Into<TaskSpec>,
        action: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        let handle = TaskHandle::new(&spec.into());
        self.shared
            .queue
            .lock()
            .unwrap()
            .add_parallel(handle.clone());
        self.shared.bus.publish(
            Event::now(EventKind::Queued)
                .with_task(handle.display_info_arc())
                .with_preference(handle.preference()),
        );

        let shared = Arc::clone(&self.shared);
        let task = handle.clone();
        let boxed: Box<dyn FnOnce() + Send + 'static> = Box::new(action);
        tokio::task::spawn_blocking(move || {
            task.mark_running();
            shared
                .bus
                .publish(Event::now(EventKind::Started).with_task(task.display_info_arc()));

            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(boxed)) {
                let message = panic
                    .downcast_ref::<&'static str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "payload panicked".to_string());
                shared.bus.publish(
                    Event::now(EventKind::Failed)
                        .with_task(task.display_info_arc())
                        .with_reason(message),
                );
            }

            shared.queue.lock().unwrap().remove_parallel(&task);
            task.mark_completed();
            shared
                .bus
                .publish(Event::now(EventKind::Completed).with_task(task.display_info_arc()));
            shared.notify_state.notify_waiters();
        });
        handle
    }

    // ---- waiting ----

    /// Waits until the task reaches its terminal state.
    ///
    /// Payload failures are not surfaced here; a panicked task completes
    /// like any other. Must not be block-waited from inside a running
    /// task; nested code should use the `add_or_run` family instead.
    pub async fn wait_for(&self, handle: &TaskHandle) {
        let notified = self.shared.notify_state.notified();
        tokio::pin!(notified);
        loop {
            notified.as_mut().enable();
            if handle.is_finished() {
                return;
            }
            notified.as_mut().await;
            notified.set(self.shared.notify_state.notified());
        }
    }

    /// Waits for a value-bearing task and takes its result. `None` if the
    /// payload panicked or the value was already taken.
    pub async fn wait_for_value<T>(&self, typed: &TypedTaskHandle<T>) -> Option<T> {
        self.wait_for(typed.handle()).await;
        typed.take_result()
    }

    /// Waits until the accurate outstanding-task count reaches zero.
    /// Returns whether any waiting actually occurred.
    ///
    /// Because a task may itself enqueue further tasks, this is the way
    /// batch operations observe that follow-on work has drained too.
    pub async fn wait_for_all_tasks_finished(&self) -> bool {
        let mut did_wait = false;
        let notified = self.shared.notify_state.notified();
        tokio::pin!(notified);
        loop {
            notified.as_mut().enable();
            if self.task_count_accurate() == 0 {
                return did_wait;
            }
            did_wait = true;
            notified.as_mut().await;
            notified.set(self.shared.notify_state.notified());
        }
    }

    // ---- introspection and control ----

    /// Cheap outstanding-task count. Includes cancelled-but-still-queued
    /// entries, so it may over-report until
    /// [`Scheduler::task_count_accurate`] observes zero and corrects it.
    pub fn task_count(&self) -> usize {
        self.shared.queue.lock().unwrap().tracked_total()
    }

    /// Exact outstanding-task count: recounts the queue, filtering
    /// cancelled entries. Observing zero resets the cheap counter.
    pub fn task_count_accurate(&self) -> usize {
        self.shared.queue.lock().unwrap().accurate_total()
    }

    /// Whether nothing is queued, running, or executing in parallel.
    pub fn are_all_tasks_done(&self) -> bool {
        self.task_count_accurate() == 0
    }

    /// Human-readable snapshot of what is running right now (or about to
    /// run). Best-effort, for status display.
    pub fn current_task_description(&self) -> String {
        let queue = self.shared.queue.lock().unwrap();
        let mut out = String::new();
        if !self.is_task_processing_enabled() {
            out.push_str("Task processing disabled, next task when re-enabled:\n");
        }
        for handle in queue.parallel() {
            out.push_str(handle.display_info());
            out.push('\n');
        }
        if let Some(current) = queue.current() {
            return current.display_info().to_string();
        }
        if let Some((label, _)) = queue.next_live(1).into_iter().next() {
            out.push_str(&label);
        }
        out
    }

    /// Human-readable snapshot of the running task and the next pending
    /// tasks (up to 10), each with its execution preference.
    pub fn next_tasks_description(&self) -> String {
        let queue = self.shared.queue.lock().unwrap();
        let mut out = String::new();
        if !self.is_task_processing_enabled() {
            out.push_str("Task processing disabled, next task when re-enabled:\n");
        }
        if let Some(current) = queue.current() {
            out.push_str(&format!(
                "{} ({})\n",
                current.display_info(),
                current.preference()
            ));
        }
        for (label, preference) in queue.next_live(10) {
            out.push_str(&format!("{label} ({preference})\n"));
        }
        out
    }

    /// Whether a live (not cancelled) queued task carries the label. Used
    /// to coalesce recurring idempotent work before submitting it again.
    pub fn has_queued_task(&self, display_info: &str) -> bool {
        self.shared.queue.lock().unwrap().has_live(display_info)
    }

    /// Snapshot of the most recently started tasks, oldest first.
    pub fn task_history(&self) -> Vec<HistoryEntry> {
        self.shared.history.lock().unwrap().iter().cloned().collect()
    }

    /// Whether the worker is executing queued tasks.
    pub fn is_task_processing_enabled(&self) -> bool {
        self.shared.processing_enabled.load(AtomicOrdering::SeqCst)
    }

    /// Pauses or resumes execution. While paused, the worker keeps queued
    /// work at its original position; nothing is lost or reordered. Used
    /// to halt mutations during risky external operations.
    pub fn set_task_processing_enabled(&self, enabled: bool) {
        self.shared
            .processing_enabled
            .store(enabled, AtomicOrdering::SeqCst);
    }

    /// Whether the calling context is executing inside a task run by this
    /// scheduler (the worker, or a nested inline execution).
    pub fn is_in_task(&self) -> bool {
        context::is_in_task(self.shared.id)
    }

    /// Publishes an [`EventKind::UntaskedCall`] diagnostic when called
    /// from outside a task. For call sites that are supposed to be
    /// reachable only through the queue.
    pub fn warn_if_not_in_task(&self, context_info: &str) {
        if !self.is_in_task() {
            self.shared.bus.publish(
                Event::now(EventKind::UntaskedCall)
                    .with_reason(format!("code not in task: {context_info}")),
            );
        }
    }

    /// New receiver for the raw event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Stops the worker: publishes [`EventKind::ShutdownRequested`],
    /// cancels the worker token, and waits up to `Config::grace` for the
    /// worker to finish its current task.
    ///
    /// Queued tasks that never ran stay queued and are never invoked;
    /// submissions after shutdown return handles that are already
    /// cancelled and complete. Idempotent.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        if self.shared.closed.swap(true, AtomicOrdering::SeqCst) {
            return Ok(());
        }
        self.shared
            .bus
            .publish(Event::now(EventKind::ShutdownRequested));
        self.shared.token.cancel();

        let worker = self.worker.lock().unwrap().take();
        if let Some(handle) = worker {
            let grace = self.shared.config.grace;
            match tokio::time::timeout(grace, handle).await {
                Ok(_) => Ok(()),
                Err(_) => Err(SchedulerError::GraceExceeded { grace }),
            }
        } else {
            Ok(())
        }
    }

    // ---- internals ----

    fn should_run_inline(&self, spec: &TaskSpec) -> bool {
        self.is_in_task() && spec.preference() != ExecutionPreference::AddOrMoveToEnd
    }

    fn add_internal(&self, handle: TaskHandle, payload: Payload) {
        if self.shared.closed.load(AtomicOrdering::SeqCst) {
            // shut down: complete immediately so waiters never hang
            handle.cancel();
            handle.mark_completed();
            self.shared.notify_state.notify_waiters();
            return;
        }

        let moved = {
            let mut queue = self.shared.queue.lock().unwrap();
            let moved = handle.preference() == ExecutionPreference::AddOrMoveToEnd
                && queue.cancel_duplicate(handle.display_info());
            queue.push(handle.clone(), payload);
            moved
        };

        let kind = if moved {
            EventKind::MovedToEnd
        } else {
            EventKind::Queued
        };
        self.shared.bus.publish(
            Event::now(kind)
                .with_task(handle.display_info_arc())
                .with_preference(handle.preference()),
        );
        self.shared.notify_queue.notify_waiters();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // a scheduler dropped without shutdown() must not leak its worker
        self.shared.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time;

    fn sched() -> Arc<Scheduler> {
        Scheduler::builder(Config::default()).build()
    }

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(
        order: &Arc<Mutex<Vec<&'static str>>>,
        label: &'static str,
    ) -> impl FnOnce() + Send + 'static {
        let order = Arc::clone(order);
        move || order.lock().unwrap().push(label)
    }

    /// Occupies the worker with a task that parks until released, so the
    /// test can stage the queue deterministically behind it.
    async fn occupy_worker(sched: &Scheduler, label: &'static str) -> (TaskHandle, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let parked = Arc::clone(&gate);
        let handle = sched.add_future(label, move || async move { parked.notified().await });
        while handle.state() != TaskState::Running {
            time::sleep(Duration::from_millis(1)).await;
        }
        (handle, gate)
    }

    #[tokio::test]
    async fn fifo_within_band() {
        let sched = sched();
        let order = recorder();

        let a = sched.add("a", push(&order, "a"));
        let b = sched.add("b", push(&order, "b"));
        let c = sched.add("c", push(&order, "c"));

        sched.wait_for(&a).await;
        sched.wait_for(&b).await;
        sched.wait_for(&c).await;
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn asap_preempts_queued_fifo() {
        let sched = sched();
        let order = recorder();
        let (_blocker, gate) = occupy_worker(&sched, "blocker").await;

        sched.add("fifo-task", push(&order, "fifo-task"));
        sched.add(
            TaskSpec::new("asap-task").with_preference(ExecutionPreference::Asap),
            push(&order, "asap-task"),
        );

        gate.notify_one();
        sched.wait_for_all_tasks_finished().await;
        assert_eq!(*order.lock().unwrap(), vec!["asap-task", "fifo-task"]);
    }

    #[tokio::test]
    async fn literal_submission_order_scenario() {
        // submit "A" (fifo), "B" (asap), "C" (fifo) back to back: B, A, C
        let sched = sched();
        let order = recorder();
        let (_blocker, gate) = occupy_worker(&sched, "blocker").await;

        sched.add("A", push(&order, "A"));
        sched.add(
            TaskSpec::new("B").with_preference(ExecutionPreference::Asap),
            push(&order, "B"),
        );
        sched.add("C", push(&order, "C"));

        gate.notify_one();
        sched.wait_for_all_tasks_finished().await;
        assert_eq!(*order.lock().unwrap(), vec!["B", "A", "C"]);
    }

    #[tokio::test]
    async fn add_or_move_to_end_dedups_by_label() {
        let sched = sched();
        let order = recorder();
        let (_blocker, gate) = occupy_worker(&sched, "blocker").await;

        let spec =
            TaskSpec::new("Restart").with_preference(ExecutionPreference::AddOrMoveToEnd);
        let first = sched.add(spec.clone(), push(&order, "first"));
        let second = sched.add(spec, push(&order, "second"));

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        gate.notify_one();
        sched.wait_for_all_tasks_finished().await;

        // exactly one execution: the second submission's payload
        assert_eq!(*order.lock().unwrap(), vec!["second"]);
        // the replaced task was skipped, and waiting on it returns
        sched.wait_for(&first).await;
        assert!(first.is_finished());
        assert!(first.time_started().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn queued_payloads_never_overlap() {
        let sched = sched();
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        for i in 0..12 {
            let active = Arc::clone(&active);
            let overlaps = Arc::clone(&overlaps);
            sched.add_future(format!("task-{i}"), move || async move {
                if active.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        sched.wait_for_all_tasks_finished().await;
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inline_execution_runs_nested_payload_synchronously() {
        let sched = sched();
        let order = recorder();

        let outer = {
            let sched = Arc::clone(&sched);
            let order = Arc::clone(&order);
            let outer_sched = Arc::clone(&sched);
            outer_sched.add_future("outer", move || async move {
                assert!(sched.is_in_task());

                let nested = sched.add_or_run("nested", {
                    let order = Arc::clone(&order);
                    move || order.lock().unwrap().push("nested")
                });
                assert!(nested.is_finished());
                order.lock().unwrap().push("outer-after");

                let nested_async = sched
                    .add_or_run_future("nested-async", {
                        let order = Arc::clone(&order);
                        move || async move { order.lock().unwrap().push("nested-async") }
                    })
                    .await;
                assert!(nested_async.is_finished());

                // forced enqueue from inside a task never runs inline
                let forced = sched.add("forced", {
                    let order = Arc::clone(&order);
                    move || order.lock().unwrap().push("forced")
                });
                assert!(!forced.is_finished());
            })
        };

        let tail = sched.add("tail", push(&order, "tail"));
        sched.wait_for(&outer).await;
        sched.wait_for(&tail).await;
        sched.wait_for_all_tasks_finished().await;

        // "tail" was queued before "forced", so it drains first
        assert_eq!(
            *order.lock().unwrap(),
            vec!["nested", "outer-after", "nested-async", "tail", "forced"]
        );
        assert!(!sched.is_in_task());
    }

    #[tokio::test]
    async fn inline_value_payload_completes_in_place() {
        let sched = sched();
        let result = {
            let sched = Arc::clone(&sched);
            let outer_sched = Arc::clone(&sched);
            outer_sched
                .add_future_value("outer", move || async move {
                    let typed = sched.add_or_run_value("nested-value", || 21 * 2);
                    assert!(typed.is_finished());
                    sched.wait_for_value(&typed).await
                })
        };
        assert_eq!(sched.wait_for_value(&result).await, Some(Some(42)));
    }

    #[tokio::test]
    async fn cancelled_task_is_skipped() {
        let sched = sched();
        let order = recorder();
        let (_blocker, gate) = occupy_worker(&sched, "blocker").await;

        let doomed = sched.add("doomed", push(&order, "doomed"));
        doomed.cancel();

        gate.notify_one();
        sched.wait_for(&doomed).await;
        assert!(doomed.is_finished());
        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn panicking_payload_does_not_poison_the_queue() {
        let sched = sched();
        let mut rx = sched.subscribe();
        let order = recorder();

        let bad = sched.add("explodes", || panic!("boom"));
        let good = sched.add("survives", push(&order, "survives"));

        sched.wait_for(&bad).await;
        sched.wait_for(&good).await;
        assert_eq!(*order.lock().unwrap(), vec!["survives"]);

        let mut failure_reason = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::Failed {
                failure_reason = ev.reason;
            }
        }
        let reason = failure_reason.expect("a Failed event must be published");
        assert!(reason.contains("boom"), "unexpected reason: {reason}");
    }

    #[tokio::test]
    async fn panicking_value_payload_yields_none() {
        let sched = sched();
        let broken = sched.add_value("broken", || -> usize { panic!("nope") });
        assert_eq!(sched.wait_for_value(&broken).await, None);

        assert_eq!(
            sched.add_async_value("still works", || 7usize).await,
            Some(7)
        );
    }

    #[tokio::test]
    async fn typed_payloads_deliver_values() {
        let sched = sched();

        let typed = sched.add_value("value", || 7usize);
        assert_eq!(sched.wait_for_value(&typed).await, Some(7));
        // a second wait observes the value as already taken
        assert_eq!(sched.wait_for_value(&typed).await, None);

        let s = sched.add_async_value("string", || "hi".to_string()).await;
        assert_eq!(s.as_deref(), Some("hi"));

        let f = sched
            .add_async_future_value("future", || async { 3usize })
            .await;
        assert_eq!(f, Some(3));
    }

    #[tokio::test]
    async fn pause_stops_execution_and_resume_preserves_order() {
        let sched = sched();
        let order = recorder();
        sched.set_task_processing_enabled(false);
        assert!(!sched.is_task_processing_enabled());

        sched.add("a", push(&order, "a"));
        sched.add("b", push(&order, "b"));
        sched.add("c", push(&order, "c"));

        time::sleep(Duration::from_millis(150)).await;
        assert!(order.lock().unwrap().is_empty());
        assert_eq!(sched.task_count(), 3);

        sched.set_task_processing_enabled(true);
        sched.wait_for_all_tasks_finished().await;
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn cheap_count_drifts_until_accurate_corrects() {
        let sched = sched();
        let (_blocker, gate) = occupy_worker(&sched, "blocker").await;

        sched.add("keep", || {});
        let doomed = sched.add("doomed", || {});
        doomed.cancel();

        // cheap count still includes the cancelled entry
        assert_eq!(sched.task_count(), 3);
        assert_eq!(sched.task_count_accurate(), 2);

        gate.notify_one();
        sched.wait_for_all_tasks_finished().await;
        assert!(sched.are_all_tasks_done());
        assert_eq!(sched.task_count(), 0);
    }

    #[tokio::test]
    async fn wait_for_all_reports_whether_it_waited() {
        let sched = sched();
        assert!(!sched.wait_for_all_tasks_finished().await);

        sched.add("work", || {});
        assert!(sched.wait_for_all_tasks_finished().await);
    }

    #[tokio::test]
    async fn queued_label_probe() {
        let sched = sched();
        let (_blocker, gate) = occupy_worker(&sched, "blocker").await;

        sched.add("restart on file change", || {});
        assert!(sched.has_queued_task("restart on file change"));
        assert!(!sched.has_queued_task("something else"));

        gate.notify_one();
        sched.wait_for_all_tasks_finished().await;
        assert!(!sched.has_queued_task("restart on file change"));
    }

    #[tokio::test]
    async fn descriptions_reflect_running_and_pending_work() {
        let sched = sched();
        let (_blocker, gate) = occupy_worker(&sched, "blocker").await;
        sched.add("pending work", || {});

        assert_eq!(sched.current_task_description(), "blocker");
        let next = sched.next_tasks_description();
        assert!(next.contains("blocker (fifo)"));
        assert!(next.contains("pending work (fifo)"));

        gate.notify_one();
        sched.wait_for_all_tasks_finished().await;

        sched.set_task_processing_enabled(false);
        assert!(sched
            .current_task_description()
            .starts_with("Task processing disabled"));
        sched.set_task_processing_enabled(true);
    }

    #[tokio::test]
    async fn history_records_started_tasks_in_order() {
        let mut config = Config::default();
        config.history_limit = 2;
        let sched = Scheduler::builder(config).build();

        sched.add("first", || {});
        sched.add("second", || {});
        sched.add("third", || {});
        sched.wait_for_all_tasks_finished().await;

        let labels: Vec<String> = sched
            .task_history()
            .iter()
            .map(|entry| entry.display_info.to_string())
            .collect();
        assert_eq!(labels, vec!["second", "third"]);
    }

    struct RecordingRunner {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl DesignatedRunner for RecordingRunner {
        async fn run(&self, work: crate::tasks::BoxTaskFuture) {
            self.hits.fetch_add(1, Ordering::SeqCst);
            work.await;
        }
    }

    #[tokio::test]
    async fn designated_payloads_go_through_the_runner() {
        let runner = Arc::new(RecordingRunner {
            hits: AtomicUsize::new(0),
        });
        let sched = Scheduler::builder(Config::default())
            .with_designated(Arc::clone(&runner) as Arc<dyn DesignatedRunner>)
            .build();

        let marked = sched.add(TaskSpec::new("ui work").on_designated_thread(), || {});
        sched.wait_for(&marked).await;
        assert_eq!(runner.hits.load(Ordering::SeqCst), 1);

        let plain = sched.add("plain work", || {});
        sched.wait_for(&plain).await;
        assert_eq!(runner.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parallel_task_is_tracked_then_untracked() {
        let sched = sched();
        let order = recorder();

        #[allow(deprecated)]
        let handle = sched.add_parallel("side work", push(&order, "side work"));
        sched.wait_for(&handle).await;

        assert_eq!(*order.lock().unwrap(), vec!["side work"]);
        assert_eq!(sched.task_count_accurate(), 0);
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let sched = sched();
        let mut rx = sched.subscribe();

        let handle = sched.add("observed", || {});
        sched.wait_for(&handle).await;

        let mut kinds = Vec::new();
        loop {
            let ev = rx.recv().await.expect("bus closed early");
            kinds.push(ev.kind);
            if ev.kind == EventKind::Completed {
                break;
            }
        }
        assert_eq!(
            kinds,
            vec![EventKind::Queued, EventKind::Started, EventKind::Completed]
        );
    }

    #[tokio::test]
    async fn replacement_publishes_moved_to_end() {
        let sched = sched();
        sched.set_task_processing_enabled(false);
        let mut rx = sched.subscribe();

        let spec =
            TaskSpec::new("Restart").with_preference(ExecutionPreference::AddOrMoveToEnd);
        sched.add(spec.clone(), || {});
        sched.add(spec, || {});

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Queued);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::MovedToEnd);
        sched.set_task_processing_enabled(true);
    }

    #[tokio::test]
    async fn untasked_call_warning() {
        let sched = sched();
        let mut rx = sched.subscribe();

        sched.warn_if_not_in_task("saving outside the queue");

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::UntaskedCall);
        assert!(ev.reason.unwrap().contains("saving outside the queue"));
    }

    #[tokio::test]
    async fn shutdown_is_clean_and_closes_submissions() {
        let sched = sched();
        let handle = sched.add("before", || {});
        sched.wait_for(&handle).await;

        assert!(sched.shutdown().await.is_ok());
        // idempotent
        assert!(sched.shutdown().await.is_ok());

        let after = sched.add("after", || {});
        assert!(after.is_finished());
        assert!(after.is_cancelled());
        sched.wait_for(&after).await;
    }

    #[tokio::test]
    async fn shutdown_reports_grace_exceeded_for_a_hung_payload() {
        let config = Config {
            grace: Duration::from_millis(50),
            ..Config::default()
        };
        let sched = Scheduler::builder(config).build();
        let (_stuck, gate) = occupy_worker(&sched, "stuck").await;

        let err = sched.shutdown().await.unwrap_err();
        assert_eq!(err.as_label(), "scheduler_grace_exceeded");

        // release the detached worker so the runtime can wind down
        gate.notify_one();
    }
}
