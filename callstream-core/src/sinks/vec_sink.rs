use std::sync::{Arc, Mutex};

use super::SnapshotSink;
use crate::snapshot::AggregationSnapshot;

/// A Helper to collect emitted snapshots into a shared vector and take them out again.
/// This is mainly useful to inspect emissions in unit tests.
/// This struct uses an Arc<Mutex<Vec<T>> internally, so it can be freely
/// cloned
#[derive(Clone, Default)]
pub struct VecSink {
    inner: Arc<Mutex<Vec<(u64, AggregationSnapshot)>>>,
}

impl VecSink {
    /// An empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all collected snapshots out of this sink
    pub fn drain(&self) -> Vec<(u64, AggregationSnapshot)> {
        self.lock().drain(..).collect()
    }

    /// Returns the number of collected snapshots
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing was emitted since the last drain
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, AggregationSnapshot)>> {
        // a poisoned lock only means a test panicked while holding it
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SnapshotSink for VecSink {
    fn emit(&mut self, batch_id: u64, snapshot: &AggregationSnapshot) -> std::io::Result<()> {
        self.lock().push((batch_id, snapshot.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_storage() {
        let sink = VecSink::new();
        let mut clone = sink.clone();
        clone.emit(0, &AggregationSnapshot::default()).unwrap();
        clone.emit(1, &AggregationSnapshot::default()).unwrap();
        assert_eq!(sink.len(), 2);
        let ids: Vec<u64> = sink.drain().into_iter().map(|x| x.0).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(clone.is_empty());
    }
}
