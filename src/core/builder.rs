//! Builder wiring: bus, subscriber fan-out, worker spawn.

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::context;
use crate::core::designated::{DesignatedRunner, InlineRunner};
use crate::core::queue::TaskQueue;
use crate::core::scheduler::{Scheduler, Shared};
use crate::core::worker;
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`Scheduler`] with optional collaborators.
pub struct SchedulerBuilder {
    config: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    designated: Arc<dyn DesignatedRunner>,
}

impl SchedulerBuilder {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            config,
            subscribers: Vec::new(),
            designated: Arc::new(InlineRunner),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive scheduler events (task lifecycle, failures,
    /// shutdown) through dedicated workers with bounded queues.
    #[must_use]
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the designated-thread collaborator used for payloads submitted
    /// with [`TaskSpec::on_designated_thread`](crate::TaskSpec::on_designated_thread).
    ///
    /// Defaults to [`InlineRunner`], which executes such payloads on the
    /// worker like any other.
    #[must_use]
    pub fn with_designated(mut self, runner: Arc<dyn DesignatedRunner>) -> Self {
        self.designated = runner;
        self
    }

    /// Builds the scheduler and starts its worker.
    ///
    /// Must be called within a tokio runtime; the worker and the
    /// subscriber listener are spawned here.
    pub fn build(self) -> Arc<Scheduler> {
        let bus = Bus::new(self.config.bus_capacity_clamped());
        let token = CancellationToken::new();

        if !self.subscribers.is_empty() {
            spawn_subscriber_listener(&bus, token.clone(), self.subscribers);
        }

        let shared = Arc::new(Shared {
            id: context::next_scheduler_id(),
            config: self.config,
            queue: Mutex::new(TaskQueue::new()),
            history: Mutex::new(VecDeque::new()),
            processing_enabled: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            bus,
            designated: self.designated,
            notify_queue: Notify::new(),
            notify_state: Notify::new(),
            token,
        });

        let worker = tokio::spawn(worker::run(Arc::clone(&shared)));
        Arc::new(Scheduler::from_parts(shared, worker))
    }
}

/// Subscribes to the bus and forwards events to the subscriber set. The
/// set is owned by the listener, so subscriber workers drain and exit once
/// the scheduler shuts down.
fn spawn_subscriber_listener(
    bus: &Bus,
    token: CancellationToken,
    subscribers: Vec<Arc<dyn Subscribe>>,
) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        let set = SubscriberSet::new(subscribers);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        }
        set.shutdown().await;
    });
}
