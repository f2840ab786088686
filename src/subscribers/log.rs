//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout, one line per transition, prefixed with
//! seconds since process start and the number of the thread that emitted it.
//!
//! ## Output format
//! ```text
//! 0.0 [1] Resource 1 constructed
//! 0.0 [2] Resource 1 running for 2.0s (20 polls)
//! 0.1 [2] Still running... (1)
//! 1.0 [1] Closing resource 1
//! 1.0 [2] Resource 1 quitting early after 10 polls
//! 1.0 [2] Resource 1 destructed
//! 2.0 [1] Resource 1 has already been deleted
//! ```

use async_trait::async_trait;

use std::fmt::Display;
use std::time::Duration;

use crate::events::{Event, EventKind, mark_process_start, thread_number};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Not intended for production use:
/// implement a custom [`Subscribe`] for structured logging or metrics collection.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Renders `e` as a single log line.
    pub fn format(e: &Event) -> String {
        let h = e.handle.map(|h| h.get()).unwrap_or_default();
        let msg = match e.kind {
            EventKind::ResourceConstructed => format!("Resource {h} constructed"),
            EventKind::ResourceDestructed => format!("Resource {h} destructed"),
            EventKind::WorkerStarting => format!(
                "Resource {h} running for {:.1}s ({} polls)",
                f64::from(e.duration_ms.unwrap_or_default()) / 1000.0,
                e.polls.unwrap_or_default()
            ),
            EventKind::WorkerPolled => match e.poll {
                Some(n) => format!("Still running... ({n})"),
                None => "Still running...".to_string(),
            },
            EventKind::WorkerCancelled => format!(
                "Resource {h} quitting early after {} polls",
                e.poll.unwrap_or_default()
            ),
            EventKind::WorkerCompleted => format!(
                "Resource {h} completed after {} polls",
                e.poll.unwrap_or_default()
            ),
            EventKind::CloseRequested => format!("Closing resource {h}"),
            EventKind::CloseIgnored => match e.reason.as_deref() {
                Some("not_issued") => format!("Resource {h} was never opened"),
                _ => format!("Resource {h} has already been deleted"),
            },
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                format!("[subscriber] {}", e.reason.as_deref().unwrap_or("?"))
            }
        };
        prefixed(e.elapsed, e.thread, msg)
    }

    /// Renders a free-form message with the same prefix, stamped for the
    /// calling thread at the current instant.
    pub fn line(msg: impl Display) -> String {
        prefixed(mark_process_start().elapsed(), thread_number(), msg)
    }

    /// Prints [`line`](Self::line) to stdout.
    pub fn note(msg: impl Display) {
        println!("{}", Self::line(msg));
    }
}

fn prefixed(elapsed: Duration, thread: u64, msg: impl Display) -> String {
    format!("{:.1} [{thread}] {msg}", elapsed.as_secs_f32())
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        println!("{}", Self::format(e));
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
