//! # Lifecycle API: `open` and `close`.
//!
//! [`Lifecycle`] ties together the [`Registry`], resource construction and worker
//! spawning. Callers only ever hold a [`Handle`]; no reference to a resource
//! escapes this module.
//!
//! ## Flow
//! ```text
//! open():
//!   registry.register_with(|h| Resource::new(h, ..))   (one lock: allocate + construct + insert)
//!     └─► worker::spawn(Arc<Resource>)                  (thread becomes the sole owner)
//!           └─► return handle                           (already resolvable)
//!
//! close(h):
//!   registry.lookup(h)
//!     ├─ Ok(resource)        → publish CloseRequested, resource.request_close(), drop Arc
//!     ├─ Err(Invalid)        → nothing (handle 0, no label)
//!     └─ Err(NotIssued|Gone) → publish CloseIgnored{reason: label}
//!
//! close_all():
//!   registry.live() → same request path as close() for each resource
//! ```
//!
//! ## Rules
//! - `open` and `close` never wait for a worker
//! - `close` is total: it never fails and cannot tell "cancelled" from "already gone"
//! - Handles are issued in lock-acquisition order, starting at `1`, never reused

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::builder::LifecycleBuilder;
use super::handle::Handle;
use super::registry::Registry;
use super::resource::{Resource, ResourceState};
use super::worker::{self, WorkerParams};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind, mark_process_start};

/// Handle-based manager of cancellable background resources.
pub struct Lifecycle {
    cfg: Config,
    params: WorkerParams,
    bus: Bus,
    registry: Registry,
    /// Stops the subscriber listener when the manager is dropped.
    listener_token: CancellationToken,
}

impl Lifecycle {
    /// Creates a manager without subscribers.
    ///
    /// Does not need an async runtime; events are still published on the bus and
    /// can be observed with [`subscribe`](Self::subscribe).
    pub fn new(cfg: Config) -> Self {
        mark_process_start();
        Self {
            params: WorkerParams::from_config(&cfg),
            bus: Bus::new(cfg.bus_capacity_clamped()),
            registry: Registry::new(),
            listener_token: CancellationToken::new(),
            cfg,
        }
    }

    /// Starts building a manager with subscribers.
    pub fn builder(cfg: Config) -> LifecycleBuilder {
        LifecycleBuilder::new(cfg)
    }

    /// Constructs, registers and starts a new resource; returns its handle.
    ///
    /// When this returns `Ok`, the handle already resolves and the worker thread
    /// has been launched (it may not have polled yet).
    ///
    /// # Errors
    /// [`RuntimeError::Spawn`] if the OS cannot create the worker thread. The
    /// handle is burnt and the resource destroyed before returning.
    ///
    /// # Example
    /// ```
    /// use handlevisor::{Config, Lifecycle};
    ///
    /// let lc = Lifecycle::new(Config::default());
    /// let h = lc.open()?;
    /// assert_eq!(h.get(), 1);
    /// assert!(lc.is_open(h));
    /// lc.close(h);
    /// # Ok::<(), handlevisor::RuntimeError>(())
    /// ```
    pub fn open(&self) -> Result<Handle, RuntimeError> {
        let resource = self
            .registry
            .register_with(|h| Resource::new(h, CancellationToken::new(), self.bus.clone()));
        let handle = resource.handle();

        worker::spawn(resource, self.params, self.cfg.thread_name)
            .map_err(|source| RuntimeError::Spawn { handle, source })?;
        Ok(handle)
    }

    /// Requests cooperative cancellation of the resource behind `handle`.
    ///
    /// A safe no-op for `0`, for handles never issued and for resources that
    /// have already terminated.
    pub fn close(&self, handle: impl Into<Handle>) {
        let handle = handle.into();
        match self.registry.lookup(handle) {
            Ok(resource) => self.request_close(&resource),
            Err(absent) => {
                if let Some(reason) = absent.as_label() {
                    self.bus.publish(
                        Event::new(EventKind::CloseIgnored)
                            .with_handle(handle)
                            .with_reason(reason),
                    );
                }
            }
        }
    }

    /// Requests cancellation of every live resource; returns how many were signalled.
    pub fn close_all(&self) -> usize {
        let live = self.registry.live();
        for resource in &live {
            self.request_close(resource);
        }
        live.len()
    }

    /// Publishes `CloseRequested` and sets the flag; the event precedes the
    /// worker's exit event.
    fn request_close(&self, resource: &Resource) {
        let mut ev = Event::new(EventKind::CloseRequested).with_handle(resource.handle());
        if resource.is_close_requested() {
            ev = ev.with_reason("already_requested");
        }
        self.bus.publish(ev);
        resource.request_close();
    }

    /// `true` while the resource behind `handle` has not been destroyed.
    pub fn is_open(&self, handle: impl Into<Handle>) -> bool {
        self.registry.resolve(handle.into()).is_some()
    }

    /// Current state of a live resource, `None` once destroyed or never issued.
    pub fn state(&self, handle: impl Into<Handle>) -> Option<ResourceState> {
        self.registry.resolve(handle.into()).map(|r| r.state())
    }

    /// Number of handles issued so far (live and dead).
    pub fn issued(&self) -> usize {
        self.registry.issued()
    }

    /// Creates a raw receiver that observes all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Configuration this manager was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn listener_token(&self) -> CancellationToken {
        self.listener_token.clone()
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.listener_token.cancel();
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("cfg", &self.cfg)
            .field("issued", &self.issued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::time::timeout;

    fn cfg(poll_ms: u64, run_ms: u64) -> Config {
        Config {
            poll_interval: Duration::from_millis(poll_ms),
            run_for: Duration::from_millis(run_ms),
            ..Config::default()
        }
    }

    /// Waits for the next event of `kind` for `handle`, skipping everything else.
    async fn wait_for(
        rx: &mut broadcast::Receiver<Event>,
        handle: Handle,
        kind: EventKind,
        within: Duration,
    ) -> Event {
        timeout(within, async {
            loop {
                let ev = rx.recv().await.expect("bus open");
                if ev.kind == kind && ev.handle == Some(handle) {
                    return ev;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no {kind:?} for handle {handle} within {within:?}"))
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn close_right_after_open_exits_early() {
        let lc = Lifecycle::new(cfg(20, 2_000));
        let mut rx = lc.subscribe();

        let h = lc.open().unwrap();
        assert_eq!(h, Handle::from(1));
        lc.close(h);

        let ev = wait_for(&mut rx, h, EventKind::WorkerCancelled, Duration::from_secs(1)).await;
        assert!(ev.poll.unwrap() <= 1, "flag seen after poll {:?}", ev.poll);

        wait_for(&mut rx, h, EventKind::ResourceDestructed, Duration::from_secs(1)).await;
        assert!(!lc.is_open(h));
    }

    #[tokio::test]
    async fn close_is_observed_on_the_next_poll() {
        const POLL_MS: u64 = 50;
        let lc = Lifecycle::new(cfg(POLL_MS, 5_000));
        let mut rx = lc.subscribe();

        let h = lc.open().unwrap();
        let last_polled = loop {
            let ev = wait_for(&mut rx, h, EventKind::WorkerPolled, Duration::from_secs(1)).await;
            if ev.poll == Some(3) {
                break 3;
            }
        };
        let closed_at = Instant::now();
        lc.close(h);

        let ev = wait_for(&mut rx, h, EventKind::WorkerCancelled, Duration::from_secs(1)).await;
        let seen = ev.poll.unwrap();
        assert!(
            seen <= last_polled + 1,
            "flag seen after poll {seen}, closed after poll {last_polled}"
        );
        assert!(closed_at.elapsed() < Duration::from_millis(POLL_MS * 2));
    }

    #[tokio::test]
    async fn concurrent_opens_run_independently_to_completion() {
        let lc = Arc::new(Lifecycle::new(cfg(10, 100)));
        let mut rx = lc.subscribe();

        let joins: Vec<_> = (0..2)
            .map(|_| {
                let lc = Arc::clone(&lc);
                std::thread::spawn(move || lc.open().unwrap())
            })
            .collect();
        let mut handles: Vec<Handle> = joins.into_iter().map(|j| j.join().unwrap()).collect();
        handles.sort();
        assert_eq!(handles, vec![Handle::from(1), Handle::from(2)]);

        let mut completed = Vec::new();
        let mut destructed = Vec::new();
        timeout(Duration::from_secs(5), async {
            while completed.len() < 2 || destructed.len() < 2 {
                let ev = rx.recv().await.unwrap();
                match ev.kind {
                    EventKind::WorkerCompleted => completed.push(ev.handle.unwrap()),
                    EventKind::ResourceDestructed => destructed.push(ev.handle.unwrap()),
                    EventKind::WorkerCancelled => panic!("nobody closed {:?}", ev.handle),
                    _ => {}
                }
            }
        })
        .await
        .expect("both workers complete");

        completed.sort();
        assert_eq!(completed, handles);
        assert!(handles.iter().all(|h| !lc.is_open(*h)));
    }

    #[tokio::test]
    async fn many_concurrent_opens_issue_first_n_handles() {
        const N: u64 = 64;
        let lc = Arc::new(Lifecycle::new(cfg(5, 20)));

        let joins: Vec<_> = (0..N)
            .map(|_| {
                let lc = Arc::clone(&lc);
                std::thread::spawn(move || lc.open().unwrap().get())
            })
            .collect();
        let mut handles: Vec<u64> = joins.into_iter().map(|j| j.join().unwrap()).collect();
        handles.sort_unstable();

        assert_eq!(handles, (1..=N).collect::<Vec<_>>());
        assert_eq!(lc.issued(), N as usize);
    }

    #[tokio::test]
    async fn close_of_never_issued_handle_is_a_single_log_line() {
        let lc = Lifecycle::new(cfg(10, 100));
        let mut rx = lc.subscribe();

        lc.close(999u64);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::CloseIgnored);
        assert_eq!(events[0].handle, Some(Handle::from(999)));
        assert_eq!(events[0].reason.as_deref(), Some("not_issued"));
        assert_eq!(lc.issued(), 0);
        assert!(!lc.is_open(999u64));
    }

    #[tokio::test]
    async fn close_of_zero_is_silent() {
        let lc = Lifecycle::new(cfg(10, 100));
        let mut rx = lc.subscribe();

        lc.close(Handle::INVALID);
        lc.close(0u64);

        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn close_after_natural_completion_is_a_no_op() {
        let lc = Lifecycle::new(cfg(10, 100));
        let mut rx = lc.subscribe();

        let h = lc.open().unwrap();
        wait_for(&mut rx, h, EventKind::ResourceDestructed, Duration::from_secs(5)).await;
        assert!(!lc.is_open(h));

        lc.close(h);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::CloseIgnored);
        assert_eq!(events[0].reason.as_deref(), Some("already_gone"));

        // and again: still a no-op
        lc.close(h);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn unclosed_resource_runs_its_full_duration() {
        let lc = Lifecycle::new(cfg(10, 150));
        let mut rx = lc.subscribe();

        let opened = Instant::now();
        let h = lc.open().unwrap();
        let done = wait_for(&mut rx, h, EventKind::WorkerCompleted, Duration::from_secs(5)).await;

        assert!(opened.elapsed() >= Duration::from_millis(150));
        assert_eq!(done.poll, Some(15));
        wait_for(&mut rx, h, EventKind::ResourceDestructed, Duration::from_secs(1)).await;
        assert_eq!(lc.state(h), None);
    }

    #[tokio::test]
    async fn double_close_while_exiting_only_sets_the_flag() {
        let lc = Lifecycle::new(cfg(200, 2_000));
        let mut rx = lc.subscribe();

        let h = lc.open().unwrap();
        // keeps the handle resolvable even if the worker exits between the two closes
        let _pin = lc.registry.resolve(h).unwrap();
        lc.close(h);
        lc.close(h);

        let mut requests = Vec::new();
        let mut cancelled = false;
        timeout(Duration::from_secs(2), async {
            while requests.len() < 2 || !cancelled {
                let ev = rx.recv().await.unwrap();
                match ev.kind {
                    EventKind::CloseRequested => requests.push(ev.reason),
                    EventKind::WorkerCancelled => cancelled = true,
                    _ => {}
                }
            }
        })
        .await
        .expect("two close requests and one early exit");

        assert_eq!(requests[0], None);
        assert_eq!(requests[1].as_deref(), Some("already_requested"));
    }

    #[tokio::test]
    async fn state_follows_the_worker() {
        let lc = Lifecycle::new(cfg(20, 2_000));
        let mut rx = lc.subscribe();

        let h = lc.open().unwrap();
        wait_for(&mut rx, h, EventKind::WorkerPolled, Duration::from_secs(1)).await;
        assert_eq!(lc.state(h), Some(ResourceState::Running));

        lc.close(h);
        wait_for(&mut rx, h, EventKind::ResourceDestructed, Duration::from_secs(1)).await;
        assert_eq!(lc.state(h), None);
    }

    #[tokio::test]
    async fn close_all_signals_every_live_resource() {
        let lc = Lifecycle::new(cfg(20, 2_000));
        let mut rx = lc.subscribe();

        let handles: Vec<Handle> = (0..3).map(|_| lc.open().unwrap()).collect();
        assert_eq!(lc.close_all(), 3);

        for h in handles {
            wait_for(&mut rx, h, EventKind::WorkerCancelled, Duration::from_secs(1)).await;
        }
    }

    #[tokio::test]
    async fn close_all_marks_repeat_requests_like_close() {
        let lc = Lifecycle::new(cfg(200, 2_000));
        let mut rx = lc.subscribe();

        let h = lc.open().unwrap();
        let _pin = lc.registry.resolve(h).unwrap();
        lc.close(h);
        assert_eq!(lc.close_all(), 1);

        let reasons: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|ev| ev.kind == EventKind::CloseRequested)
            .map(|ev| ev.reason)
            .collect();
        assert_eq!(reasons.len(), 2);
        assert_eq!(reasons[0], None);
        assert_eq!(reasons[1].as_deref(), Some("already_requested"));
    }
}
