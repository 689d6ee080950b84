//! Running counts per call type.
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dedup::DedupedBatch;
use crate::time::{EventTime, Timestamp};
use crate::watermark::is_late;

/// Aggregation state of a single call type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    /// Number of batch-level distinct occurrences counted so far. Never decreases.
    pub count: u64,
    /// Earliest event time counted into this window
    pub window_start: EventTime,
    /// [EventTime::MAX] for unbounded windows
    pub window_end: EventTime,
    /// Largest event time counted into this window
    pub last_seen_event_time: Option<EventTime>,
    /// Disposition of the most recently counted occurrence
    pub last_disposition: String,
}

impl WindowState {
    /// Windows are unbounded: they open at the first event and never end.
    fn open(event_time: Option<EventTime>) -> Self {
        Self {
            count: 0,
            window_start: event_time.unwrap_or(EventTime::MIN),
            window_end: EventTime::MAX,
            last_seen_event_time: None,
            last_disposition: String::new(),
        }
    }
}

/// What happened to a deduplicated batch when it was applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Keys which incremented a count
    pub counted: usize,
    /// Keys dropped for being behind the watermark
    pub late: usize,
}

/// Owns the [WindowState] of every call type seen so far.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    state: IndexMap<String, WindowState>,
    allowed_lateness: Duration,
    max_keys: Option<usize>,
}

impl AggregationEngine {
    /// Create an engine. `allowed_lateness` is added to a window's end before it can be
    /// evicted, `max_keys` optionally bounds the number of live windows.
    pub fn new(allowed_lateness: Duration, max_keys: Option<usize>) -> Self {
        Self {
            state: IndexMap::new(),
            allowed_lateness,
            max_keys,
        }
    }

    /// Count every key of the batch which is not late relative to `watermark`.
    ///
    /// A call type's `last_disposition` is taken from its key which occurred last in the batch.
    pub fn apply(&mut self, batch: &DedupedBatch, watermark: EventTime) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        // position of the latest counted occurrence per call type in this batch
        let mut latest: IndexMap<&str, usize> = IndexMap::new();
        for (key, occurrence) in batch.occurrences() {
            let event_time = occurrence.event_time;
            if is_late(event_time, watermark) {
                debug!(crime_type = %key.original_crime_type_name, ?event_time, %watermark, "Dropping late key");
                outcome.late += 1;
                continue;
            }
            let window = self
                .state
                .entry(key.original_crime_type_name.clone())
                .or_insert_with(|| WindowState::open(event_time));
            window.count += 1;
            let crime_type = key.original_crime_type_name.as_str();
            if latest
                .get(crime_type)
                .map_or(true, |&p| occurrence.last_position > p)
            {
                latest.insert(crime_type, occurrence.last_position);
                window.last_disposition.clone_from(&key.disposition);
            }
            if let Some(t) = event_time {
                window.window_start = window.window_start.min(t);
                window.last_seen_event_time = window.last_seen_event_time.max(Some(t));
            }
            outcome.counted += 1;
        }
        self.enforce_max_keys();
        outcome
    }

    /// Remove all windows which can no longer receive events.
    /// Returns the evicted windows.
    pub fn evict_expired(&mut self, watermark: EventTime) -> Vec<(String, WindowState)> {
        let lateness = self.allowed_lateness;
        let mut evicted = Vec::new();
        self.state.retain(|key, window| {
            let expired = window.window_end != EventTime::MAX
                && window.window_end.saturating_add(lateness) <= watermark;
            if expired {
                evicted.push((key.clone(), window.clone()));
            }
            !expired
        });
        evicted
    }

    fn enforce_max_keys(&mut self) {
        let Some(max) = self.max_keys else {
            return;
        };
        if self.state.len() <= max {
            return;
        }
        let excess = self.state.len() - max;
        // oldest first, keys without an event time count as oldest
        self.state.sort_by(|ka, a, kb, b| {
            a.last_seen_event_time
                .cmp(&b.last_seen_event_time)
                .then_with(|| ka.cmp(kb))
        });
        let evicted: Vec<String> = self.state.drain(..excess).map(|(k, _)| k).collect();
        debug!(?evicted, max, "Evicted aggregation keys over capacity");
    }

    /// Current state of a call type
    pub fn get(&self, crime_type: &str) -> Option<&WindowState> {
        self.state.get(crime_type)
    }

    /// All live windows in insertion order
    pub fn windows(&self) -> impl Iterator<Item = (&String, &WindowState)> {
        self.state.iter()
    }

    /// Number of live windows
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// True before the first key was counted
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::dedup::dedupe;
    use crate::testing::call;

    fn engine() -> AggregationEngine {
        AggregationEngine::new(Duration::ZERO, None)
    }

    #[test]
    fn counts_distinct_pairs_per_type() {
        let mut agg = engine();
        let events = [
            call("Theft", "A", ""),
            call("Theft", "A", ""),
            call("Theft", "B", ""),
            call("Robbery", "B", ""),
        ];
        let outcome = agg.apply(&dedupe(&events), EventTime::MIN);
        assert_eq!(outcome, ApplyOutcome { counted: 3, late: 0 });
        assert_eq!(agg.get("Theft").unwrap().count, 2);
        assert_eq!(agg.get("Robbery").unwrap().count, 1);
    }

    #[test]
    fn counts_accumulate_across_batches() {
        let mut agg = engine();
        let batch = dedupe(&[call("Theft", "A", "")]);
        agg.apply(&batch, EventTime::MIN);
        agg.apply(&batch, EventTime::MIN);
        agg.apply(&batch, EventTime::MIN);
        assert_eq!(agg.get("Theft").unwrap().count, 3);
    }

    #[test]
    fn late_keys_are_not_counted() {
        let mut agg = engine();
        let events = [
            call("Theft", "A", "2018-12-31T08:00:00"),
            call("Robbery", "B", "2018-12-31T10:00:00"),
        ];
        let watermark = EventTime::parse("2018-12-31T09:00:00").unwrap();
        let outcome = agg.apply(&dedupe(&events), watermark);
        assert_eq!(outcome, ApplyOutcome { counted: 1, late: 1 });
        assert!(agg.get("Theft").is_none());
        assert_eq!(agg.get("Robbery").unwrap().count, 1);
    }

    #[test]
    fn tracks_window_bounds_and_disposition() {
        let mut agg = engine();
        agg.apply(&dedupe(&[call("Theft", "A", "2018-12-31T10:00:00")]), EventTime::MIN);
        agg.apply(&dedupe(&[call("Theft", "B", "2018-12-31T09:00:00")]), EventTime::MIN);
        let window = agg.get("Theft").unwrap();
        assert_eq!(window.window_start, EventTime::parse("2018-12-31T09:00:00").unwrap());
        assert_eq!(window.window_end, EventTime::MAX);
        assert_eq!(window.last_seen_event_time, EventTime::parse("2018-12-31T10:00:00"));
        assert_eq!(window.last_disposition, "B");
    }

    #[test]
    fn disposition_follows_latest_occurrence_in_batch() {
        let mut agg = engine();
        let events = [
            call("Theft", "A", "2018-12-31T10:00:00"),
            call("Theft", "B", "2018-12-31T09:00:00"),
            call("Theft", "A", "2018-12-31T11:00:00"),
        ];
        agg.apply(&dedupe(&events), EventTime::MIN);
        let window = agg.get("Theft").unwrap();
        assert_eq!(window.count, 2);
        assert_eq!(window.last_disposition, "A");
        assert_eq!(window.last_seen_event_time, EventTime::parse("2018-12-31T11:00:00"));
    }

    #[test]
    fn late_keys_do_not_set_disposition() {
        let mut agg = engine();
        let events = [
            call("Theft", "A", "2018-12-31T10:00:00"),
            call("Theft", "B", "2018-12-31T08:00:00"),
        ];
        let watermark = EventTime::parse("2018-12-31T09:00:00").unwrap();
        agg.apply(&dedupe(&events), watermark);
        assert_eq!(agg.get("Theft").unwrap().last_disposition, "A");
    }

    #[test]
    fn unbounded_windows_never_expire() {
        let mut agg = engine();
        agg.apply(&dedupe(&[call("Theft", "A", "2018-12-31T10:00:00")]), EventTime::MIN);
        assert!(agg.evict_expired(EventTime::from_millis(i64::MAX - 1)).is_empty());
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn bounded_windows_expire_after_lateness() {
        let mut agg = AggregationEngine::new(Duration::from_millis(10), None);
        agg.apply(&dedupe(&[call("Theft", "A", "")]), EventTime::MIN);
        agg.state.get_mut("Theft").unwrap().window_end = EventTime::from_millis(100);
        assert!(agg.evict_expired(EventTime::from_millis(109)).is_empty());
        let evicted = agg.evict_expired(EventTime::from_millis(110));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, "Theft");
        assert!(agg.is_empty());
    }

    #[test]
    fn max_keys_evicts_oldest() {
        let mut agg = AggregationEngine::new(Duration::ZERO, Some(2));
        agg.apply(&dedupe(&[call("Old", "A", "2018-12-31T08:00:00")]), EventTime::MIN);
        agg.apply(&dedupe(&[call("Mid", "A", "2018-12-31T09:00:00")]), EventTime::MIN);
        agg.apply(&dedupe(&[call("New", "A", "2018-12-31T10:00:00")]), EventTime::MIN);
        assert_eq!(agg.len(), 2);
        assert!(agg.get("Old").is_none());
        assert!(agg.get("Mid").is_some());
        assert!(agg.get("New").is_some());
    }

    proptest! {
        #[test]
        fn count_equals_distinct_batch_occurrences(
            batches in prop::collection::vec(
                prop::collection::vec(("[A-D]", "[xyz]"), 0..12),
                0..12,
            )
        ) {
            let mut agg = engine();
            let mut expected: HashMap<String, u64> = HashMap::new();
            for batch in &batches {
                let events: Vec<_> = batch.iter().map(|(t, d)| call(t, d, "")).collect();
                let deduped = dedupe(&events);
                for key in deduped.keys() {
                    *expected.entry(key.original_crime_type_name.clone()).or_default() += 1;
                }
                let before: HashMap<String, u64> =
                    agg.windows().map(|(k, w)| (k.clone(), w.count)).collect();
                agg.apply(&deduped, EventTime::MIN);
                for (k, w) in agg.windows() {
                    prop_assert!(w.count >= before.get(k).copied().unwrap_or(0));
                }
            }
            let actual: HashMap<String, u64> =
                agg.windows().map(|(k, w)| (k.clone(), w.count)).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
