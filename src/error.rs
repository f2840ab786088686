//! Error types used by the handlevisor runtime.
//!
//! [`RuntimeError`] covers the few failures the lifecycle API can report.
//! `Close` is total and has no error type: closing an invalid, unknown or
//! already finished handle is a silent no-op reported only on the event bus.

use thiserror::Error;

use crate::core::Handle;

/// # Errors produced by the handlevisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The OS refused to create the worker thread for a freshly opened resource.
    ///
    /// The handle was consumed and will never be issued again; the resource was
    /// dropped and resolves as absent.
    #[error("failed to spawn worker thread for handle {handle}: {source}")]
    Spawn {
        /// Handle that had been assigned to the resource.
        handle: Handle,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Subscribers were configured but no tokio runtime is current.
    #[error("subscribers require a running tokio runtime")]
    NoAsyncRuntime,

    /// The process-wide lifecycle was already initialised.
    #[error("process-wide lifecycle is already installed")]
    GlobalAlreadyInstalled,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use handlevisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::NoAsyncRuntime.as_label(), "runtime_no_async_runtime");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Spawn { .. } => "runtime_spawn_failed",
            RuntimeError::NoAsyncRuntime => "runtime_no_async_runtime",
            RuntimeError::GlobalAlreadyInstalled => "runtime_global_already_installed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_keeps_source() {
        use std::error::Error as _;

        let err = RuntimeError::Spawn {
            handle: Handle::from(4),
            source: std::io::Error::other("no threads left"),
        };
        assert_eq!(err.as_label(), "runtime_spawn_failed");
        assert!(err.to_string().contains("handle 4"));
        assert!(err.source().is_some());
    }
}
