//! # Resource: immutable handle, cooperative cancellation flag, observable state.
//!
//! ## State machine
//! ```text
//!   Created ──► Running ──┬──► Cancelling ──┐
//!                         │                 ├──► (dropped) Destroyed
//!                         └──► Completing ──┘
//! ```
//! - `Created`: handle reserved, flag clear, no worker has touched it yet
//! - `Running`: the worker loop has started and holds the only strong reference
//! - `Cancelling`: the worker observed the flag and is returning early
//! - `Completing`: the full simulated duration elapsed without cancellation
//! - `Destroyed`: implicit; the registry's `Weak` no longer upgrades
//!
//! ## Rules
//! - Cancellation is **monotonic** (a [`CancellationToken`] never resets)
//! - [`Resource::request_close`] only sets the flag; it never waits or wakes the worker
//! - Construction publishes `ResourceConstructed`, drop publishes `ResourceDestructed`

use std::sync::atomic::{AtomicU8, Ordering};

use tokio_util::sync::CancellationToken;

use super::handle::Handle;
use crate::events::{Bus, Event, EventKind};

/// Observable lifecycle state of a live resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ResourceState {
    /// Registered, worker not started yet.
    Created = 0,
    /// Worker loop is polling.
    Running = 1,
    /// Worker observed cancellation and is exiting.
    Cancelling = 2,
    /// Worker ran to natural completion and is exiting.
    Completing = 3,
}

impl ResourceState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ResourceState::Created,
            1 => ResourceState::Running,
            2 => ResourceState::Cancelling,
            _ => ResourceState::Completing,
        }
    }
}

/// A handle-addressed cancellable background entity.
///
/// Instances are only ever created by the [`Registry`](super::registry::Registry)
/// while it holds its slot lock, and are only ever strongly owned by their worker
/// (plus transient holders such as `Open` before spawning or `Close` while setting the flag).
pub struct Resource {
    handle: Handle,
    cancel: CancellationToken,
    state: AtomicU8,
    bus: Bus,
}

impl Resource {
    /// Creates a resource for an already allocated handle.
    pub(crate) fn new(handle: Handle, cancel: CancellationToken, bus: Bus) -> Self {
        bus.publish(Event::new(EventKind::ResourceConstructed).with_handle(handle));
        Self {
            handle,
            cancel,
            state: AtomicU8::new(ResourceState::Created as u8),
            bus,
        }
    }

    /// Handle this resource was registered under.
    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Sets the cancellation flag. Idempotent.
    ///
    /// The worker sees the flag on its next poll, at most one poll interval later.
    pub fn request_close(&self) {
        self.cancel.cancel();
    }

    /// `true` once [`request_close`](Self::request_close) has been called.
    #[inline]
    pub fn is_close_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResourceState {
        ResourceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves `Created → Running`; returns `false` if the worker already started.
    pub(crate) fn mark_running(&self) -> bool {
        self.state
            .compare_exchange(
                ResourceState::Created as u8,
                ResourceState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Records a terminal worker state (`Cancelling` or `Completing`).
    pub(crate) fn mark_exiting(&self, state: ResourceState) {
        debug_assert!(matches!(
            state,
            ResourceState::Cancelling | ResourceState::Completing
        ));
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        self.bus
            .publish(Event::new(EventKind::ResourceDestructed).with_handle(self.handle));
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("handle", &self.handle)
            .field("state", &self.state())
            .field("close_requested", &self.is_close_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(bus: &Bus) -> Resource {
        Resource::new(Handle::from(1), CancellationToken::new(), bus.clone())
    }

    #[test]
    fn request_close_is_idempotent_and_monotonic() {
        let bus = Bus::new(16);
        let r = resource(&bus);
        assert!(!r.is_close_requested());
        r.request_close();
        r.request_close();
        assert!(r.is_close_requested());
    }

    #[test]
    fn running_is_entered_once() {
        let bus = Bus::new(16);
        let r = resource(&bus);
        assert_eq!(r.state(), ResourceState::Created);
        assert!(r.mark_running());
        assert!(!r.mark_running());
        assert_eq!(r.state(), ResourceState::Running);
        r.mark_exiting(ResourceState::Cancelling);
        assert_eq!(r.state(), ResourceState::Cancelling);
    }

    #[test]
    fn construct_and_drop_are_published() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        drop(resource(&bus));

        let constructed = rx.try_recv().unwrap();
        let destructed = rx.try_recv().unwrap();
        assert_eq!(constructed.kind, EventKind::ResourceConstructed);
        assert_eq!(destructed.kind, EventKind::ResourceDestructed);
        assert_eq!(destructed.handle, Some(Handle::from(1)));
    }
}
