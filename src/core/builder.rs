use std::sync::Arc;

use tokio::runtime;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_util::sync::CancellationToken;

use super::lifecycle::Lifecycle;
use crate::{
    config::Config,
    error::RuntimeError,
    events::{Bus, Event},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Lifecycle`] with event subscribers.
pub struct LifecycleBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl LifecycleBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the manager and, if there are subscribers, wires the fan-out.
    ///
    /// # Errors
    /// [`RuntimeError::NoAsyncRuntime`] if subscribers were given and this is
    /// not called from within a tokio runtime.
    pub fn build(self) -> Result<Arc<Lifecycle>, RuntimeError> {
        let lifecycle = Arc::new(Lifecycle::new(self.cfg));
        if self.subscribers.is_empty() {
            return Ok(lifecycle);
        }

        let rt = runtime::Handle::try_current().map_err(|_| RuntimeError::NoAsyncRuntime)?;
        let bus = lifecycle.bus().clone();
        let subs = SubscriberSet::new(self.subscribers, bus.clone(), &rt);
        spawn_listener(&rt, &bus, subs, lifecycle.listener_token());
        Ok(lifecycle)
    }
}

/// Forwards bus events to the subscriber set until `token` is cancelled.
///
/// On cancellation, events still buffered on the bus are forwarded before the
/// set is shut down, and the shutdown drains every subscriber queue.
fn spawn_listener(rt: &runtime::Handle, bus: &Bus, subs: SubscriberSet, token: CancellationToken) {
    let mut rx = bus.subscribe();
    rt.spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit(&ev),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(_)) => {
                        subs.emit(&Event::subscriber_overflow("listener", "lagged"));
                    }
                },
                _ = token.cancelled() => break,
            }
        }
        forward_buffered(&mut rx, &subs);
        subs.shutdown().await;
    });
}

/// Forwards whatever is already buffered on the bus without waiting for more.
fn forward_buffered(rx: &mut broadcast::Receiver<Event>, subs: &SubscriberSet) {
    loop {
        match rx.try_recv() {
            Ok(ev) => subs.emit(&ev),
            Err(TryRecvError::Lagged(_)) => {
                subs.emit(&Event::subscriber_overflow("listener", "lagged"));
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[test]
    fn subscribers_without_runtime_are_rejected() {
        let err = Lifecycle::builder(Config::default())
            .with_subscribers(vec![Arc::new(Recorder::default()) as Arc<dyn Subscribe>])
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NoAsyncRuntime));
    }

    #[test]
    fn no_subscribers_needs_no_runtime() {
        let lc = Lifecycle::builder(Config::default()).build().unwrap();
        assert_eq!(lc.issued(), 0);
    }

    #[tokio::test]
    async fn subscribers_see_the_whole_lifecycle() {
        let rec = Arc::new(Recorder::default());
        let cfg = Config {
            poll_interval: Duration::from_millis(10),
            run_for: Duration::from_millis(30),
            ..Config::default()
        };
        let lc = Lifecycle::builder(cfg)
            .with_subscribers(vec![rec.clone() as Arc<dyn Subscribe>])
            .build()
            .unwrap();

        let h = lc.open().unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while lc.is_open(h) || !rec.0.lock().contains(&EventKind::ResourceDestructed) {
            assert!(tokio::time::Instant::now() < deadline, "lifecycle never finished");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let seen = rec.0.lock().clone();
        assert_eq!(seen.first(), Some(&EventKind::ResourceConstructed));
        assert!(seen.contains(&EventKind::WorkerStarting));
        assert!(seen.contains(&EventKind::WorkerCompleted));
        assert_eq!(seen.last(), Some(&EventKind::ResourceDestructed));
    }

    #[tokio::test]
    async fn dropping_the_manager_still_delivers_buffered_events() {
        for round in 0..20 {
            let rec = Arc::new(Recorder::default());
            let lc = Lifecycle::builder(Config::default())
                .with_subscribers(vec![rec.clone() as Arc<dyn Subscribe>])
                .build()
                .unwrap();

            // current-thread runtime: the listener has not run yet when the token fires
            lc.close(999u64);
            drop(lc);

            let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
            while !rec.0.lock().contains(&EventKind::CloseIgnored) {
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "close of an unknown handle was not delivered in round {round}"
                );
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }
}
