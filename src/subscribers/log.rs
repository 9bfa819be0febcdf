//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [queued] task=save project preference=fifo
//! [moved-to-end] task=restart on file change
//! [started] task=save project
//! [failed] task=save project reason="disk full"
//! [completed] task=save project
//! [untasked-call] reason="code not in task: ..."
//! [shutdown-requested]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::Queued => {
                if let (Some(task), Some(preference)) = (&e.task, e.preference) {
                    println!("[queued] task={task} preference={preference}");
                }
            }
            EventKind::MovedToEnd => {
                println!("[moved-to-end] task={:?}", e.task);
            }
            EventKind::Started => {
                println!("[started] task={:?}", e.task);
            }
            EventKind::Completed => {
                println!("[completed] task={:?}", e.task);
            }
            EventKind::Failed => {
                println!("[failed] task={:?} reason={:?}", e.task, e.reason);
            }
            EventKind::UntaskedCall => {
                println!("[untasked-call] reason={:?}", e.reason);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
