//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the lifecycle API, resources and
//! their worker threads. It is the crate's logging side-channel: every event is
//! stamped with elapsed time and the emitting thread's number.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Lifecycle::open`/`close`, `Resource` (construct/drop),
//!   worker loops, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener (fans out to `SubscriberSet`) and any
//!   receiver obtained via `Lifecycle::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, mark_process_start};
#[cfg(feature = "logging")]
pub(crate) use event::thread_number;
