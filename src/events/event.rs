//! # Runtime events emitted by the lifecycle API, resources and workers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Resource events**: construction and destruction of a resource
//! - **Worker events**: start, per-poll progress, early and normal exit
//! - **Close events**: cancellation requested or close of an absent handle
//!
//! Every [`Event`] is stamped at creation with the emitting thread's number and
//! the time elapsed since process start, so the stamp reflects the thread that
//! observed the transition, not the thread that later prints it.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use handlevisor::{Event, EventKind, Handle};
//!
//! let ev = Event::new(EventKind::WorkerPolled)
//!     .with_handle(Handle::from(3))
//!     .with_poll(4);
//!
//! assert_eq!(ev.kind, EventKind::WorkerPolled);
//! assert_eq!(ev.handle, Some(Handle::from(3)));
//! assert_eq!(ev.poll, Some(4));
//! ```

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime};

use crate::core::Handle;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Counter used to number threads in order of their first emitted event.
static THREAD_SEQ: AtomicU64 = AtomicU64::new(0);

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

thread_local! {
    static THREAD_NO: Cell<u64> = const { Cell::new(0) };
}

/// Pins the process start instant used for [`Event::elapsed`].
///
/// Idempotent; the first call (or the first event, whichever comes first) wins.
pub fn mark_process_start() -> Instant {
    *PROCESS_START.get_or_init(Instant::now)
}

/// Small per-thread number, assigned on first use from 1 upwards.
pub fn thread_number() -> u64 {
    THREAD_NO.with(|no| {
        if no.get() == 0 {
            no.set(THREAD_SEQ.fetch_add(1, AtomicOrdering::Relaxed) + 1);
        }
        no.get()
    })
}

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> reason=<full|closed>`
    SubscriberOverflow,

    // === Resource events ===
    /// Resource was constructed and registered.
    ///
    /// Sets:
    /// - `handle`: newly issued handle
    ResourceConstructed,

    /// Last strong owner dropped; the resource is freed.
    ///
    /// Sets:
    /// - `handle`: handle of the freed resource
    ResourceDestructed,

    // === Worker events ===
    /// Worker loop entered.
    ///
    /// Sets:
    /// - `handle`: resource handle
    /// - `polls`: planned number of polls
    /// - `duration_ms`: planned simulated duration (ms)
    WorkerStarting,

    /// One poll interval elapsed without cancellation being observed.
    ///
    /// Sets:
    /// - `handle`: resource handle
    /// - `poll`: 1-based index of the completed poll
    WorkerPolled,

    /// Worker observed the cancellation flag and returned early.
    ///
    /// Sets:
    /// - `handle`: resource handle
    /// - `poll`: number of polls completed before exit
    WorkerCancelled,

    /// Worker ran the full simulated duration.
    ///
    /// Sets:
    /// - `handle`: resource handle
    /// - `poll`: number of polls completed
    WorkerCompleted,

    // === Close events ===
    /// `Close` resolved a live resource and set its cancellation flag.
    ///
    /// Sets:
    /// - `handle`: resource handle
    CloseRequested,

    /// `Close` was called for a handle that does not resolve.
    ///
    /// Sets:
    /// - `handle`: the requested handle
    /// - `reason`: `already_gone` or `not_issued`
    CloseIgnored,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`/`elapsed`: wall-clock and process-relative timestamps
/// - `thread`: number of the thread that emitted the event
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Time since process start.
    pub elapsed: Duration,
    /// Per-thread number of the emitting thread.
    pub thread: u64,

    /// Event classification.
    pub kind: EventKind,
    /// Resource handle, if applicable.
    pub handle: Option<Handle>,
    /// Poll index or completed poll count.
    pub poll: Option<u32>,
    /// Planned number of polls (worker start).
    pub polls: Option<u32>,
    /// Planned simulated duration in milliseconds (compact).
    pub duration_ms: Option<u32>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind, stamped with time, thread and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        let start = mark_process_start();
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            elapsed: start.elapsed(),
            thread: thread_number(),
            kind,
            handle: None,
            poll: None,
            polls: None,
            duration_ms: None,
            reason: None,
        }
    }

    /// Attaches a resource handle.
    #[inline]
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Attaches a poll index/count.
    #[inline]
    pub fn with_poll(mut self, n: u32) -> Self {
        self.poll = Some(n);
        self
    }

    /// Attaches the planned poll count.
    #[inline]
    pub fn with_polls(mut self, n: u32) -> Self {
        self.polls = Some(n);
        self
    }

    /// Attaches a planned duration (stored as milliseconds).
    #[inline]
    pub fn with_duration(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.duration_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
