//! Injectable time sources for the debounce scheduler.
//!
//! All readings are milliseconds. Only differences between readings matter to
//! the scheduler, so each clock is free to choose its own epoch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

/// A source of millisecond timestamps.
pub trait Clock: Send + Sync {
    /// Current reading in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Monotonic clock measured from its own creation.
///
/// Backed by `tokio::time::Instant`, so it follows paused/advanced time inside
/// tokio tests.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose zero is "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Wall clock in Unix milliseconds, wrapping chrono.
///
/// Unlike [`MonotonicClock`] this can move backwards when the system time is
/// adjusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now_millis(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually driven clock for tests and simulations.
///
/// Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    current: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            current: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    /// Jump to an absolute reading. Moving backwards is allowed.
    pub fn set(&self, millis: u64) {
        self.current.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.current.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_millis(), 100);

        clock.advance(50);
        assert_eq!(clock.now_millis(), 150);

        // Backwards jumps are allowed
        clock.set(20);
        assert_eq!(clock.now_millis(), 20);
    }

    #[test]
    fn test_manual_clock_clones_share_reading() {
        let clock = ManualClock::new(0);
        let other = clock.clone();

        clock.advance(42);
        assert_eq!(other.now_millis(), 42);
    }

    #[test]
    fn test_wall_clock_is_unix_millis() {
        let reading = WallClock.now_millis();
        // Some time after 2020-01-01
        assert!(reading > 1_577_836_800_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_follows_paused_time() {
        let clock = MonotonicClock::new();
        assert_eq!(clock.now_millis(), 0);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.now_millis(), 250);
    }
}
