//! # Designated-thread collaborator seam.
//!
//! Some payloads must execute on one specific thread (typically the thread
//! owning non-thread-safe UI or FFI state). The scheduler does not
//! implement that marshaling; it hands the fully composed payload future
//! to a [`DesignatedRunner`] and awaits its completion.
//!
//! ## Contract
//! - `run` must drive the future to completion before returning.
//! - The future is self-contained: panic containment and event publishing
//!   are already wired in, so the runner only decides *where* it is polled.
//! - The scheduler awaits `run`, so serialized ordering is preserved even
//!   when execution hops threads.

use async_trait::async_trait;

use crate::tasks::BoxTaskFuture;

/// Executes payload futures on a designated thread.
///
/// Implementations typically send the future to an event loop they own
/// and signal back on completion.
#[async_trait]
pub trait DesignatedRunner: Send + Sync + 'static {
    /// Drives `work` to completion on the designated thread.
    async fn run(&self, work: BoxTaskFuture);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Default runner: polls the work in place, on the worker.
///
/// Used when no designated thread exists (headless operation, tests).
pub struct InlineRunner;

#[async_trait]
impl DesignatedRunner for InlineRunner {
    async fn run(&self, work: BoxTaskFuture) {
        work.await;
    }

    fn name(&self) -> &'static str {
        "inline"
    }
}
