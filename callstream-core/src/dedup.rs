//! Per micro-batch deduplication of calls by `(call type, disposition)`.
use indexmap::IndexMap;

use crate::record::{CallEvent, DedupKey};
use crate::time::EventTime;

/// What a batch saw of one [DedupKey]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    /// Greatest event time among the key's occurrences, `None` if none had a parseable one
    pub event_time: Option<EventTime>,
    /// Position of the key's last occurrence in the batch
    pub last_position: usize,
}

/// The distinct [DedupKey]s of one micro-batch in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupedBatch {
    keys: IndexMap<DedupKey, Occurrence>,
}

impl DedupedBatch {
    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if the batch held no countable call
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether `key` occurred in the batch
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains_key(key)
    }

    /// Iterate the keys in order of first appearance
    pub fn keys(&self) -> impl Iterator<Item = &DedupKey> {
        self.keys.keys()
    }

    /// Iterate keys along with their latest event time
    pub fn iter(&self) -> impl Iterator<Item = (&DedupKey, Option<EventTime>)> {
        self.keys.iter().map(|(k, o)| (k, o.event_time))
    }

    /// Iterate keys along with everything the batch saw of them
    pub fn occurrences(&self) -> impl Iterator<Item = (&DedupKey, Occurrence)> {
        self.keys.iter().map(|(k, o)| (k, *o))
    }

    fn insert(&mut self, key: DedupKey, event_time: Option<EventTime>, position: usize) {
        let slot = self.keys.entry(key).or_insert(Occurrence {
            event_time,
            last_position: position,
        });
        slot.event_time = slot.event_time.max(event_time);
        slot.last_position = position;
    }
}

impl FromIterator<(DedupKey, Option<EventTime>)> for DedupedBatch {
    fn from_iter<I: IntoIterator<Item = (DedupKey, Option<EventTime>)>>(iter: I) -> Self {
        let mut batch = DedupedBatch::default();
        for (position, (key, time)) in iter.into_iter().enumerate() {
            batch.insert(key, time, position);
        }
        batch
    }
}

/// Collect the distinct `(call type, disposition)` pairs of a batch.
///
/// Calls with an empty call type are dropped before deduplication.
/// This is a pure function, no state is carried from one batch to the next.
pub fn dedupe<'a>(events: impl IntoIterator<Item = &'a CallEvent>) -> DedupedBatch {
    events
        .into_iter()
        .filter_map(|event| event.dedup_key().map(|key| (key, event.event_time())))
        .collect()
}
