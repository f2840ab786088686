//! Opaque handle identifying a resource to external callers.
//!
//! A [`Handle`] is the index of the resource's slot in the
//! [`Registry`](crate::core::registry::Registry). Value `0` is reserved and never
//! issued; every issued handle is positive and unique for the life of the process.

use std::fmt;

/// Opaque, non-reusable resource identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Reserved "invalid/unbound" handle.
    pub const INVALID: Handle = Handle(0);

    /// Wraps a raw handle value received from a caller.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// `false` only for [`Handle::INVALID`].
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<Handle> for u64 {
    fn from(h: Handle) -> Self {
        h.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
