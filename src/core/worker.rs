//! # Worker loop: cooperative poll-and-sleep task on a detached OS thread.
//!
//! ## Flow
//! ```text
//! spawn(resource) ──► thread "{prefix}-{handle}" ──► run(resource)
//!
//! run:
//!   ├─► mark Running, publish WorkerStarting
//!   ├─► for poll in 1..=polls:
//!   │     ├─ flag set? ──► mark Cancelling, publish WorkerCancelled, return
//!   │     ├─ sleep(poll_interval, last one trimmed to the remainder)
//!   │     └─ publish WorkerPolled{poll}
//!   ├─► mark Completing, publish WorkerCompleted
//!   └─► drop Arc<Resource> (last owner ⇒ ResourceDestructed)
//! ```
//!
//! ## Rules
//! - One thread per resource, never joined
//! - The flag is read once per poll; the sleep is never interrupted
//! - Cancellation latency is bounded by one `poll_interval`
//! - Exit is always clean: no error, only the terminal event

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::resource::{Resource, ResourceState};
use crate::config::Config;
use crate::events::{Event, EventKind};

/// Timing parameters of a worker loop, derived from [`Config`].
#[derive(Clone, Copy, Debug)]
pub struct WorkerParams {
    /// Sleep between two polls.
    pub poll_interval: Duration,
    /// Number of polls that make up the simulated duration.
    pub polls: u32,
    /// Sleep of the final poll; shorter than `poll_interval` when the
    /// simulated duration is not a whole number of polls.
    pub last_interval: Duration,
}

impl WorkerParams {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval_clamped(),
            polls: cfg.poll_count(),
            last_interval: cfg.last_poll_interval(),
        }
    }

    /// Sleep taken after `done` polls have completed.
    fn sleep_for(&self, done: u32) -> Duration {
        if done + 1 >= self.polls {
            self.last_interval
        } else {
            self.poll_interval
        }
    }

    fn duration(&self) -> Duration {
        match self.polls {
            0 => Duration::ZERO,
            n => self
                .poll_interval
                .saturating_mul(n - 1)
                .saturating_add(self.last_interval),
        }
    }
}

/// How a worker loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// Flag observed after `polls` completed polls.
    Cancelled { polls: u32 },
    /// Full duration elapsed.
    Completed { polls: u32 },
}

/// Starts the worker for `resource` on a new detached thread.
///
/// The thread takes over `resource` as its strong reference. On error the
/// closure, and with it the resource, is dropped before this returns.
pub fn spawn(resource: Arc<Resource>, params: WorkerParams, name_prefix: &str) -> io::Result<()> {
    let name = format!("{name_prefix}-{}", resource.handle());
    thread::Builder::new()
        .name(name)
        .spawn(move || {
            run(resource, params);
        })
        .map(drop)
}

/// Runs the worker loop to completion or observed cancellation.
///
/// Consumes the caller's strong reference; it is released when this returns.
pub fn run(resource: Arc<Resource>, params: WorkerParams) -> WorkerExit {
    resource.mark_running();
    let handle = resource.handle();
    let bus = resource.bus().clone();

    bus.publish(
        Event::new(EventKind::WorkerStarting)
            .with_handle(handle)
            .with_polls(params.polls)
            .with_duration(params.duration()),
    );

    for done in 0..params.polls {
        if resource.is_close_requested() {
            resource.mark_exiting(ResourceState::Cancelling);
            bus.publish(
                Event::new(EventKind::WorkerCancelled)
                    .with_handle(handle)
                    .with_poll(done),
            );
            return WorkerExit::Cancelled { polls: done };
        }

        thread::sleep(params.sleep_for(done));
        bus.publish(
            Event::new(EventKind::WorkerPolled)
                .with_handle(handle)
                .with_poll(done + 1),
        );
    }

    resource.mark_exiting(ResourceState::Completing);
    bus.publish(
        Event::new(EventKind::WorkerCompleted)
            .with_handle(handle)
            .with_poll(params.polls),
    );
    WorkerExit::Completed {
        polls: params.polls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Handle;
    use crate::events::Bus;
    use std::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn resource(bus: &Bus) -> Arc<Resource> {
        Arc::new(Resource::new(Handle::from(7), CancellationToken::new(), bus.clone()))
    }

    fn params(ms: u64, polls: u32) -> WorkerParams {
        WorkerParams {
            poll_interval: Duration::from_millis(ms),
            polls,
            last_interval: Duration::from_millis(ms),
        }
    }

    #[test]
    fn runs_full_duration_without_cancellation() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let started = Instant::now();

        let exit = run(resource(&bus), params(5, 4));

        assert_eq!(exit, WorkerExit::Completed { polls: 4 });
        assert!(started.elapsed() >= Duration::from_millis(20));

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ResourceConstructed,
                EventKind::WorkerStarting,
                EventKind::WorkerPolled,
                EventKind::WorkerPolled,
                EventKind::WorkerPolled,
                EventKind::WorkerPolled,
                EventKind::WorkerCompleted,
                EventKind::ResourceDestructed,
            ]
        );
    }

    #[test]
    fn pre_cancelled_worker_exits_before_first_sleep() {
        let bus = Bus::new(64);
        let r = resource(&bus);
        r.request_close();
        let weak = Arc::downgrade(&r);

        let started = Instant::now();
        let exit = run(r, params(1_000, 20));

        assert_eq!(exit, WorkerExit::Cancelled { polls: 0 });
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(weak.upgrade().is_none(), "worker must release its reference");
    }

    #[test]
    fn cancellation_is_observed_within_one_poll() {
        const POLL_MS: u64 = 50;
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        let r = resource(&bus);
        let observer = Arc::clone(&r);

        let join = thread::spawn(move || run(r, params(POLL_MS, 100)));
        let last_polled = loop {
            let ev = rx.blocking_recv().unwrap();
            if ev.kind == EventKind::WorkerPolled && ev.poll == Some(3) {
                break 3;
            }
        };
        let requested = Instant::now();
        observer.request_close();
        let exit = join.join().unwrap();

        match exit {
            WorkerExit::Cancelled { polls } => assert!(
                polls <= last_polled + 1,
                "flag seen after poll {polls}, requested after poll {last_polled}"
            ),
            other => panic!("expected early exit, got {other:?}"),
        }
        assert!(requested.elapsed() < Duration::from_millis(POLL_MS * 2));
        assert_eq!(observer.state(), ResourceState::Cancelling);
    }

    #[test]
    fn partial_last_poll_ends_at_run_for() {
        let cfg = Config {
            poll_interval: Duration::from_millis(20),
            run_for: Duration::from_millis(50),
            ..Config::default()
        };
        let p = WorkerParams::from_config(&cfg);
        assert_eq!(p.polls, 3);
        assert_eq!(p.sleep_for(0), Duration::from_millis(20));
        assert_eq!(p.sleep_for(1), Duration::from_millis(20));
        assert_eq!(p.sleep_for(2), Duration::from_millis(10));
        assert_eq!(p.duration(), cfg.run_for);

        let bus = Bus::new(64);
        let started = Instant::now();
        assert_eq!(run(resource(&bus), p), WorkerExit::Completed { polls: 3 });
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn zero_polls_completes_immediately() {
        let bus = Bus::new(64);
        assert_eq!(
            run(resource(&bus), params(10, 0)),
            WorkerExit::Completed { polls: 0 }
        );
    }

    #[test]
    fn spawned_worker_releases_resource() {
        let bus = Bus::new(64);
        let r = resource(&bus);
        let weak = Arc::downgrade(&r);
        spawn(r, params(1, 1), "test-worker").unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while weak.upgrade().is_some() {
            assert!(Instant::now() < deadline, "worker did not release resource");
            thread::sleep(Duration::from_millis(5));
        }
    }
}
