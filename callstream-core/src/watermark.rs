//! Event-time progress tracking.
use std::time::Duration;

use crate::time::{EventTime, Timestamp};

/// Default bound on out-of-orderness before an event counts as late
pub const DEFAULT_LATENESS: Duration = Duration::from_secs(60 * 60);

/// Tracks the largest event time seen so far and derives a watermark from it.
///
/// The watermark is `max(observed event times) - lateness` and starts at [EventTime::MIN].
/// It never decreases: observing an older timestamp leaves the maximum untouched.
#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    lateness: Duration,
    max_event_time: Option<EventTime>,
}

impl Default for WatermarkTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LATENESS)
    }
}

impl WatermarkTracker {
    /// Create a tracker with the given lateness threshold
    pub fn new(lateness: Duration) -> Self {
        Self {
            lateness,
            max_event_time: None,
        }
    }

    /// Record an observed event time
    pub fn observe(&mut self, event_time: EventTime) {
        if self.max_event_time.is_none_or(|max| event_time > max) {
            self.max_event_time = Some(event_time);
        }
    }

    /// Largest event time observed so far
    pub fn max_event_time(&self) -> Option<EventTime> {
        self.max_event_time
    }

    /// Configured bound on out-of-orderness
    pub fn lateness(&self) -> Duration {
        self.lateness
    }

    /// The current watermark. Events with a timestamp below it are late.
    pub fn current_watermark(&self) -> EventTime {
        match self.max_event_time {
            Some(max) => max - self.lateness,
            None => EventTime::MIN,
        }
    }

    /// Whether a window ending at `window_end` can no longer receive events
    pub fn is_finalized(&self, window_end: EventTime) -> bool {
        self.current_watermark() >= window_end
    }
}

/// Whether `event_time` is late relative to `watermark`.
/// Events without an event time are never late.
#[inline]
pub fn is_late(event_time: Option<EventTime>, watermark: EventTime) -> bool {
    event_time.is_some_and(|t| t < watermark)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const HOUR: i64 = 3_600_000;

    #[test]
    fn starts_at_min() {
        let tracker = WatermarkTracker::default();
        assert_eq!(tracker.current_watermark(), EventTime::MIN);
        assert!(!is_late(Some(EventTime::from_millis(i64::MIN + 1)), tracker.current_watermark()));
    }

    #[test]
    fn trails_max_by_lateness() {
        let mut tracker = WatermarkTracker::default();
        tracker.observe(EventTime::from_millis(10 * HOUR));
        assert_eq!(tracker.current_watermark(), EventTime::from_millis(9 * HOUR));
    }

    #[test]
    fn older_observations_do_not_regress() {
        let mut tracker = WatermarkTracker::default();
        tracker.observe(EventTime::from_millis(10 * HOUR));
        tracker.observe(EventTime::from_millis(2 * HOUR));
        assert_eq!(tracker.max_event_time(), Some(EventTime::from_millis(10 * HOUR)));
        assert_eq!(tracker.current_watermark(), EventTime::from_millis(9 * HOUR));
    }

    #[test]
    fn finalization() {
        let mut tracker = WatermarkTracker::new(Duration::from_millis(10));
        tracker.observe(EventTime::from_millis(100));
        assert!(tracker.is_finalized(EventTime::from_millis(90)));
        assert!(!tracker.is_finalized(EventTime::from_millis(91)));
        assert!(!tracker.is_finalized(EventTime::MAX));
    }

    #[test]
    fn lateness_boundary() {
        let wm = EventTime::from_millis(1000);
        assert!(is_late(Some(EventTime::from_millis(999)), wm));
        assert!(!is_late(Some(EventTime::from_millis(1000)), wm));
        assert!(!is_late(None, wm));
    }

    proptest! {
        #[test]
        fn watermark_is_monotonic(times in prop::collection::vec(any::<i64>(), 0..64)) {
            let mut tracker = WatermarkTracker::default();
            let mut previous = tracker.current_watermark();
            for t in times {
                tracker.observe(EventTime::from_millis(t));
                let current = tracker.current_watermark();
                prop_assert!(current >= previous);
                previous = current;
            }
        }
    }
}
