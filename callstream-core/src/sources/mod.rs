//! Sources deliver bounded micro-batches of raw payloads to the engine.
mod vec_source;

use std::time::Duration;

pub use vec_source::VecSource;

use crate::errorhandling::BrokerError;

/// Default bound on the records of one micro-batch
pub const DEFAULT_MAX_RECORDS_PER_BATCH: usize = 100;
/// Default bound on the records one partition contributes to a micro-batch
pub const DEFAULT_MAX_RECORDS_PER_PARTITION: usize = 2;

/// Admission control for micro-batches. Both limits must be greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Total records in one batch
    pub max_records: usize,
    /// Records a single partition may contribute to one batch
    pub max_per_partition: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS_PER_BATCH,
            max_per_partition: DEFAULT_MAX_RECORDS_PER_PARTITION,
        }
    }
}

/// A stream of raw records, consumed in bounded micro-batches.
pub trait BatchSource: 'static {
    /// A single raw record; its bytes are the JSON payload
    type Record: AsRef<[u8]>;

    /// Wait at most `timeout` for new records and return the next micro-batch.
    /// An empty batch means nothing arrived in time.
    fn poll_batch(&mut self, timeout: Duration) -> Result<Vec<Self::Record>, BrokerError>;

    /// Called after the engine committed the state changes of the last returned batch.
    fn commit(&mut self) {}

    /// Called once when the job stops, after the last commit. Sources which commit
    /// asynchronously make sure here that the last commit reaches the broker.
    fn close(&mut self) {}

    /// Whether the source will never yield records again. Unbounded sources return false.
    fn is_finished(&mut self) -> bool {
        false
    }
}
