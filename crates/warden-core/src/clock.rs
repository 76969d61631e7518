//! Injected clocks
//!
//! Nothing in the boundary reads the wall clock directly. Session start and
//! end instants, enrichment timestamps and the rate limiter window all come
//! from a [`Clock`] handed in by the host, which keeps every component
//! deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::Timestamp;

/// Millisecond time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Wall clock - milliseconds since the Unix epoch
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // A clock set before the epoch reads as zero rather than failing
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().min(u64::MAX as u128) as u64)
            .unwrap_or(0);
        Timestamp::from_millis(millis)
    }
}

/// Hand-driven clock for tests and simulations
/// INVARIANT: only moves forward
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(millis: u64) -> Self {
        ManualClock {
            millis: AtomicU64::new(millis),
        }
    }

    /// Advance by a duration, returning the new time
    pub fn advance(&self, by: Duration) -> Timestamp {
        self.advance_ms(by.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn advance_ms(&self, millis: u64) -> Timestamp {
        let prev = self.millis.fetch_add(millis, Ordering::AcqRel);
        Timestamp::from_millis(prev.saturating_add(millis))
    }

    /// Jump to an absolute time; ignored if it would move backwards
    pub fn set(&self, millis: u64) {
        self.millis.fetch_max(millis, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::starting_at(1_000);
        assert_eq!(clock.now().as_millis(), 1_000);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now().as_millis(), 1_250);

        assert_eq!(clock.advance_ms(50).as_millis(), 1_300);
    }

    #[test]
    fn test_manual_clock_never_rewinds() {
        let clock = ManualClock::starting_at(500);
        clock.set(100);
        assert_eq!(clock.now().as_millis(), 500);
        clock.set(900);
        assert_eq!(clock.now().as_millis(), 900);
    }

    #[test]
    fn test_system_clock_is_past_epoch() {
        assert!(SystemClock.now() > Timestamp::ZERO);
    }
}
