//! Ambient in-task detection.
//!
//! Every payload execution (worker, inline, designated thread) is wrapped
//! in a task-local scope carrying the owning scheduler's id. Any code on
//! that execution path, sync or async, can ask "am I already inside a task
//! of this scheduler?" without the scheduler threading context through
//! call signatures.
//!
//! The scope nests: a payload that inline-runs a nested payload stays
//! inside the outer scope, so nested code still reports in-task.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

tokio::task_local! {
    /// Id of the scheduler whose task is currently executing.
    static ACTIVE_SCHEDULER: u64;
}

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(0);

/// Allocates a process-unique scheduler id.
pub(crate) fn next_scheduler_id() -> u64 {
    NEXT_SCHEDULER_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Whether the calling context is executing inside a task owned by the
/// scheduler with the given id.
pub(crate) fn is_in_task(scheduler_id: u64) -> bool {
    ACTIVE_SCHEDULER
        .try_with(|id| *id == scheduler_id)
        .unwrap_or(false)
}

/// Runs `fut` inside the in-task scope of the given scheduler.
pub(crate) fn enter<F: Future>(scheduler_id: u64, fut: F) -> impl Future<Output = F::Output> {
    ACTIVE_SCHEDULER.scope(scheduler_id, fut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flag_is_scoped_to_execution() {
        let id = next_scheduler_id();
        assert!(!is_in_task(id));

        enter(id, async move {
            assert!(is_in_task(id));
            // a different scheduler's id is not considered in-task
            assert!(!is_in_task(id + 1));
        })
        .await;

        assert!(!is_in_task(id));
    }

    #[tokio::test]
    async fn sync_code_inside_scope_sees_flag() {
        let id = next_scheduler_id();
        let observed = enter(id, async move {
            let probe = move || is_in_task(id);
            probe()
        })
        .await;
        assert!(observed);
    }
}
