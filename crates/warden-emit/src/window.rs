//! Rate limit window
//!
//! Sliding log of admission times. An event is admitted when fewer than
//! `max_events` were admitted in the `length` before it; entries at least
//! `length` old are evicted first, so the log never holds more than
//! `max_events` timestamps.

use std::collections::VecDeque;
use std::time::Duration;

use warden_core::{DurationMs, Timestamp};

/// Default events admitted per window
pub const DEFAULT_MAX_EVENTS: u32 = 50;

/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Upper bound on the log's up-front allocation
const PREALLOCATE_LIMIT: usize = 1024;

#[derive(Clone, Debug)]
pub struct RateWindow {
    max_events: u32,
    length: DurationMs,
    /// Admission times inside the window, oldest first
    admitted: VecDeque<Timestamp>,
}

impl RateWindow {
    pub fn new(max_events: u32, length: Duration) -> Self {
        let capacity = (max_events as usize).min(PREALLOCATE_LIMIT);
        RateWindow {
            max_events,
            length: DurationMs::from_duration(length),
            admitted: VecDeque::with_capacity(capacity),
        }
    }

    /// Count one event at `now`; false if it exceeds the budget
    pub fn try_acquire(&mut self, now: Timestamp) -> bool {
        self.evict(now);
        if self.admitted.len() >= self.max_events as usize {
            return false;
        }
        self.admitted.push_back(now);
        true
    }

    fn evict(&mut self, now: Timestamp) {
        while let Some(&oldest) = self.admitted.front() {
            if now.elapsed_since(oldest) < self.length {
                break;
            }
            self.admitted.pop_front();
        }
    }

    /// Events admitted within the last `length`, as of the latest attempt
    #[inline]
    pub fn count(&self) -> u32 {
        self.admitted.len() as u32
    }

    #[inline]
    pub fn max_events(&self) -> u32 {
        self.max_events
    }

    #[inline]
    pub fn length(&self) -> DurationMs {
        self.length
    }

    pub fn reset(&mut self) {
        self.admitted.clear();
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS, DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn test_boundary() {
        let mut window = RateWindow::default();
        for i in 0..50 {
            assert!(window.try_acquire(at(1_000 + i)), "event {} refused", i);
        }
        assert!(!window.try_acquire(at(1_100)));
        assert_eq!(window.count(), 50);

        // Oldest admission was at 1000, so the log is still full at 1999
        assert!(!window.try_acquire(at(1_999)));
        assert!(window.try_acquire(at(2_000)));
        assert_eq!(window.count(), 50);
        assert!(!window.try_acquire(at(2_000)));
        assert!(window.try_acquire(at(2_001)));
    }

    #[test]
    fn test_burst_straddling_boundary() {
        let mut window = RateWindow::default();
        assert!(window.try_acquire(at(0)));
        let late = (0..49).filter(|_| window.try_acquire(at(990))).count();
        assert_eq!(late, 49);

        // Only the admission at 0 has aged out by 1000
        let edge = (0..50).filter(|_| window.try_acquire(at(1_000))).count();
        assert_eq!(edge, 1);
        assert_eq!(window.count(), 50);

        // Nothing between 990 and 1989 may exceed the budget
        assert!(!window.try_acquire(at(1_989)));
        let recovered = (0..50).filter(|_| window.try_acquire(at(1_990))).count();
        assert_eq!(recovered, 49);
    }

    #[test]
    fn test_clock_going_backwards_does_not_reset() {
        let mut window = RateWindow::new(1, Duration::from_millis(100));
        assert!(window.try_acquire(at(500)));
        assert!(!window.try_acquire(at(100)));
    }

    #[test]
    fn test_zero_budget_refuses_everything() {
        let mut window = RateWindow::new(0, DEFAULT_WINDOW);
        assert!(!window.try_acquire(at(0)));
        assert!(!window.try_acquire(at(5_000)));
    }

    #[test]
    fn test_unbounded_budget_does_not_preallocate() {
        let mut window = RateWindow::new(u32::MAX, DEFAULT_WINDOW);
        for i in 0..2_000 {
            assert!(window.try_acquire(at(i)));
        }
        assert_eq!(window.count(), 1_000);
    }

    #[test]
    fn test_reset() {
        let mut window = RateWindow::new(1, DEFAULT_WINDOW);
        assert!(window.try_acquire(at(0)));
        window.reset();
        assert!(window.try_acquire(at(1)));
    }

    proptest! {
        #[test]
        fn prop_admits_exactly_budget_within_window(max in 0u32..100, n in 0u32..200) {
            let mut window = RateWindow::new(max, DEFAULT_WINDOW);
            let admitted = (0..n).filter(|i| window.try_acquire(at(*i as u64))).count() as u32;
            prop_assert_eq!(admitted, n.min(max));

            window.try_acquire(at(10_000));
            prop_assert_eq!(window.count(), u32::from(max > 0));
        }

        #[test]
        fn prop_never_exceeds_budget_in_any_window(
            max in 1u32..20,
            gaps in proptest::collection::vec(0u64..300, 1..200),
        ) {
            let mut window = RateWindow::new(max, DEFAULT_WINDOW);
            let mut now = 0u64;
            let mut admitted = Vec::new();
            for gap in gaps {
                now += gap;
                if window.try_acquire(at(now)) {
                    admitted.push(now);
                }
            }
            for (i, start) in admitted.iter().enumerate() {
                let inside = admitted[i..].iter().take_while(|t| **t < start + 1_000).count();
                prop_assert!(inside <= max as usize);
            }
        }
    }
}
