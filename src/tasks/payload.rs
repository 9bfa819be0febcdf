//! Boxed task payloads.
//!
//! The scheduler accepts four payload shapes (action, value-returning
//! function, future, value-returning future); the public API folds them
//! all into the two variants here. Value-returning shapes are wrapped by
//! the submission layer into closures that store into the handle's result
//! slot, so the runtime never sees the value type.
//!
//! Future payloads are stored as factories: the future is created at
//! execution time, not at submission time, so no payload state exists
//! before the task actually runs.

use std::future::Future;
use std::pin::Pin;

/// Boxed future with no output, as produced by a payload factory.
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub(crate) enum Payload {
    /// Synchronous closure, run to completion on the executing thread.
    Action(Box<dyn FnOnce() + Send + 'static>),
    /// Future factory, invoked and awaited at execution time.
    Future(Box<dyn FnOnce() -> BoxTaskFuture + Send + 'static>),
}

impl Payload {
    pub(crate) fn from_action(action: impl FnOnce() + Send + 'static) -> Self {
        Payload::Action(Box::new(action))
    }

    pub(crate) fn from_future<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Payload::Future(Box::new(move || Box::pin(f()) as BoxTaskFuture))
    }

    /// Consumes the payload and runs it to completion.
    pub(crate) async fn run(self) {
        match self {
            Payload::Action(action) => action(),
            Payload::Future(factory) => factory().await,
        }
    }
}
