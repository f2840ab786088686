//! # handlevisor
//!
//! **Handlevisor** is a handle-based lifecycle manager for cancellable background workers.
//!
//! `open()` creates a resource, registers it and starts its worker on a dedicated
//! thread, returning an opaque integer [`Handle`]. Any thread can later call
//! `close(handle)` to request cooperative cancellation without ever holding a
//! reference to the resource. Stale, unknown or zero handles are always safe.
//!
//! ## Architecture
//! ### Ownership
//! ```text
//!   caller ── Handle(u64) ──► Lifecycle
//!                                │
//!                                ▼
//!                   Registry: Mutex<Vec<Weak<Resource>>>      (non-owning)
//!                                ┆ upgrade on lookup
//!                                ▼
//!                   Resource { handle, CancellationToken, state }
//!                                ▲
//!                                │ Arc (sole strong owner)
//!                   worker thread "handlevisor-worker-{handle}"
//! ```
//!
//! ### Lifecycle
//! ```text
//! open()  ─► register_with(|h| Resource::new(h))  ─► spawn worker ─► Handle
//!
//! worker loop {
//!   ├─► flag set?  ─► WorkerCancelled, exit        (Cancelling)
//!   ├─► sleep(poll_interval)
//!   └─► WorkerPolled
//! } ─► WorkerCompleted                             (Completing)
//!   └─► drop Arc ─► ResourceDestructed             (Destroyed: lookup now absent)
//!
//! close(h) ─► lookup(h)
//!   ├─ live  ─► CloseRequested, set flag           (seen within one poll)
//!   ├─ 0     ─► nothing
//!   └─ other ─► CloseIgnored
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                  |
//! |-------------------|---------------------------------------------------------------|-------------------------------------|
//! | **Lifecycle**     | Open/close resources by handle.                               | [`Lifecycle`], [`Handle`]           |
//! | **Events**        | Timestamped, thread-numbered transition events.               | [`Event`], [`EventKind`]            |
//! | **Subscribers**   | Hook into lifecycle events (logging, metrics, tests).         | [`Subscribe`], [`SubscriberSet`]    |
//! | **Errors**        | Typed errors for the few fallible operations.                 | [`RuntimeError`]                    |
//! | **Configuration** | Poll interval, simulated duration, bus capacity.              | [`Config`]                          |
//!
//! ## Optional features
//! - `logging` (default): exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use handlevisor::{Config, Lifecycle};
//!
//! let cfg = Config {
//!     poll_interval: Duration::from_millis(10),
//!     run_for: Duration::from_millis(200),
//!     ..Config::default()
//! };
//! let lc = Lifecycle::new(cfg);
//!
//! let h = lc.open()?;
//! lc.close(h);
//! lc.close(h);      // idempotent
//! lc.close(999u64); // never issued: no-op
//! lc.close(0u64);   // invalid: no-op
//! # Ok::<(), handlevisor::RuntimeError>(())
//! ```

mod config;
mod core;
mod error;
mod events;
mod subscribers;

use std::sync::{Arc, OnceLock};

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{Handle, Lifecycle, LifecycleBuilder, ResourceState};
pub use error::RuntimeError;
pub use events::{Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

static GLOBAL: OnceLock<Arc<Lifecycle>> = OnceLock::new();

/// Installs `lifecycle` as the process-wide manager used by [`open`] and [`close`].
///
/// # Errors
/// [`RuntimeError::GlobalAlreadyInstalled`] if a manager was installed before, or
/// if [`global`] was already initialised with the default one.
pub fn install(lifecycle: Arc<Lifecycle>) -> Result<(), RuntimeError> {
    GLOBAL
        .set(lifecycle)
        .map_err(|_| RuntimeError::GlobalAlreadyInstalled)
}

/// Returns the process-wide manager, creating a default one on first use.
pub fn global() -> &'static Arc<Lifecycle> {
    GLOBAL.get_or_init(|| Arc::new(Lifecycle::new(Config::default())))
}

/// Opens a resource on the process-wide manager.
///
/// # Errors
/// See [`Lifecycle::open`].
pub fn open() -> Result<Handle, RuntimeError> {
    global().open()
}

/// Closes a resource on the process-wide manager. Always succeeds.
pub fn close(handle: impl Into<Handle>) {
    global().close(handle);
}
