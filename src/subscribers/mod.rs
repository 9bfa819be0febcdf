//! # Event subscribers for the scheduler runtime.
//!
//! This module provides the [`Subscribe`] trait and the fan-out machinery
//! for handling events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ```text
//! Event flow:
//!   worker ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                  ┌───────┼───────┐
//!                                                  ▼       ▼       ▼
//!                                             [queue 1] [queue 2] [queue N]
//!                                                  ▼       ▼       ▼
//!                                              on_event  on_event  on_event
//! ```
//!
//! Subscribers are the crate's error sink and observability layer: every
//! contained payload panic arrives as an
//! [`EventKind::Failed`](crate::EventKind::Failed) event.

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
