//! # Event subscribers for the handlevisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the built-in [`LogWriter`] (feature `logging`).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Open/Close, workers ── publish(Event) ──► Bus ──► subscriber listener
//!                                                         │
//!                                                         ▼
//!                                                   SubscriberSet::emit
//!                                                ┌────────┼────────┐
//!                                                ▼        ▼        ▼
//!                                            LogWriter  Metrics  Custom ...
//! ```
//!
//! Subscribers are driven by tokio tasks, so a lifecycle built with subscribers
//! needs a current tokio runtime. Without subscribers no runtime is required.

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
