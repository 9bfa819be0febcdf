//! # Global scheduler configuration.
//!
//! Provides [`Config`], the centralized settings for the scheduler
//! runtime, passed to [`Scheduler::builder`](crate::Scheduler::builder).
//!
//! ## Sentinel values
//! - `bus_capacity` is clamped to a minimum of 1 by the bus
//! - `history_limit = 0` → no history is recorded

use std::time::Duration;

/// Global configuration for the scheduler runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for the worker to finish its current task
///   during [`shutdown`](crate::Scheduler::shutdown)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `pause_poll`: how long the worker sleeps between queue checks while
///   task processing is disabled
/// - `history_limit`: number of started-task records retained
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for the worker during shutdown before giving
    /// up and leaving it detached.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events
    /// will observe `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Sleep between worker cycles while processing is disabled.
    ///
    /// While disabled, the worker pops the next entry, puts it back at its
    /// original queue position, and sleeps this long.
    pub pause_poll: Duration,

    /// Maximum number of entries kept in the started-task history ring.
    pub history_limit: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `pause_poll = 50ms`
    /// - `history_limit = 121`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            pause_poll: Duration::from_millis(50),
            history_limit: 121,
        }
    }
}
