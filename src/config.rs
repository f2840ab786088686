//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for a [`Lifecycle`](crate::Lifecycle).
//!
//! ## Sentinel values
//! - `poll_interval = 0s` → clamped to 1 ms (a zero quantum would spin)
//! - `run_for = 0s` → worker exits as completed without polling
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Minimum poll quantum applied when `poll_interval` is zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Global configuration for a lifecycle manager.
///
/// ## Field semantics
/// - `poll_interval`: time between cancellation checks; bounds cancellation latency
/// - `run_for`: simulated duration of a worker that is never closed
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `thread_name`: prefix of worker thread names (`{thread_name}-{handle}`)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Fixed interval between two cancellation polls.
    ///
    /// A `Close` becomes visible to the worker no later than one interval after it is issued.
    pub poll_interval: Duration,

    /// Total simulated duration of the worker loop.
    ///
    /// The loop performs [`Config::poll_count`] polls and then completes normally.
    /// When `run_for` is not a whole multiple of the poll interval, the last
    /// sleep is shortened so the loop still ends after exactly `run_for`.
    pub run_for: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Prefix for worker thread names.
    pub thread_name: &'static str,
}

impl Config {
    /// Returns the poll interval, never zero.
    #[inline]
    pub fn poll_interval_clamped(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }

    /// Number of polls that make up `run_for` (rounded up).
    ///
    /// `2s / 100ms` gives `20`; `250ms / 100ms` gives `3`, the last one 50ms long.
    pub fn poll_count(&self) -> u32 {
        let quantum = self.poll_interval_clamped().as_nanos();
        let total = self.run_for.as_nanos();
        let polls = total.div_ceil(quantum);
        u32::try_from(polls).unwrap_or(u32::MAX)
    }

    /// Length of the final poll's sleep, so that all polls add up to `run_for`.
    ///
    /// Equals the poll interval when `run_for` is a whole multiple of it, and
    /// `Duration::ZERO` when there are no polls.
    pub fn last_poll_interval(&self) -> Duration {
        let polls = self.poll_count();
        if polls == 0 {
            return Duration::ZERO;
        }
        let full = self.poll_interval_clamped().saturating_mul(polls - 1);
        self.run_for
            .saturating_sub(full)
            .min(self.poll_interval_clamped())
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `poll_interval = 100ms`
    /// - `run_for = 2s` (20 polls)
    /// - `bus_capacity = 1024`
    /// - `thread_name = "handlevisor-worker"`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            run_for: Duration::from_secs(2),
            bus_capacity: 1024,
            thread_name: "handlevisor-worker",
        }
    }
}
