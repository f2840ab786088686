//! # Handle registry - process-wide table of non-owning resource references.
//!
//! The registry maps each issued [`Handle`] to a [`Weak`] reference to its
//! [`Resource`]. It never extends a resource's lifetime: the only strong owner of a
//! running resource is its worker thread.
//!
//! ## Architecture
//! ```text
//! slots: Mutex<Vec<Weak<Resource>>>
//!
//!   index:   0        1          2          3
//!          ┌──────┬──────────┬──────────┬──────────┐
//!          │ void │ Weak(R1) │ Weak(R2) │ Weak(R3) │ ◄── register_with() appends
//!          └──────┴──────────┴──────────┴──────────┘
//!             ▲        ▲          ▲
//!          reserved  expired   live ──► lookup() upgrades to Arc<Resource>
//! ```
//!
//! ## Rules
//! - Slot `0` is permanently empty; handle `0` never resolves
//! - Handle allocation, construction and insertion happen under **one** lock acquisition
//! - Slots are never removed, compacted or reused (dead slots stay expired forever)
//! - Lookup never blocks on resource state; absence is a normal outcome

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::handle::Handle;
use super::resource::Resource;

/// Why a handle did not resolve to a live resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Absent {
    /// Handle `0`. Never logged: closing it is silent.
    Invalid,
    /// Handle was never issued by this registry.
    NotIssued,
    /// Resource existed but has been destroyed.
    Gone,
}

impl Absent {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// `None` for [`Absent::Invalid`], which is not worth a log line.
    pub fn as_label(&self) -> Option<&'static str> {
        match self {
            Absent::Invalid => None,
            Absent::NotIssued => Some("not_issued"),
            Absent::Gone => Some("already_gone"),
        }
    }
}

/// Append-only table of weak resource references indexed by handle.
pub struct Registry {
    slots: Mutex<Vec<Weak<Resource>>>,
}

impl Registry {
    /// Creates a registry whose first issued handle will be `1`.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(vec![Weak::new()]),
        }
    }

    /// Allocates the next handle, builds the resource for it and registers it.
    ///
    /// `make` runs while the slot table is locked, so two concurrent calls can
    /// never observe the same handle and handles are issued without gaps in
    /// lock-acquisition order. The returned `Arc` is the only strong reference.
    pub fn register_with<F>(&self, make: F) -> Arc<Resource>
    where
        F: FnOnce(Handle) -> Resource,
    {
        let mut slots = self.slots.lock();
        let handle = Handle::from_raw(slots.len() as u64);
        let resource = Arc::new(make(handle));
        debug_assert_eq!(resource.handle(), handle);
        slots.push(Arc::downgrade(&resource));
        resource
    }

    /// Resolves `handle` to a temporarily strengthened reference, or `None`.
    pub fn resolve(&self, handle: Handle) -> Option<Arc<Resource>> {
        self.lookup(handle).ok()
    }

    /// Like [`resolve`](Self::resolve), but reports why the handle is absent.
    pub fn lookup(&self, handle: Handle) -> Result<Arc<Resource>, Absent> {
        if !handle.is_valid() {
            return Err(Absent::Invalid);
        }
        let slots = self.slots.lock();
        let slot = slots.get(handle.slot()).ok_or(Absent::NotIssued)?;
        slot.upgrade().ok_or(Absent::Gone)
    }

    /// Strong references to every resource that is still alive.
    pub fn live(&self) -> Vec<Arc<Resource>> {
        let slots = self.slots.lock();
        slots.iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of handles issued so far.
    pub fn issued(&self) -> usize {
        self.slots.lock().len() - 1
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
