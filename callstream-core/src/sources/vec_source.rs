use std::collections::VecDeque;
use std::time::Duration;

use super::{BatchLimits, BatchSource};
use crate::errorhandling::BrokerError;

/// A bounded in-memory source which yields a prepared sequence of polls.
///
/// Every element of the sequence is the outcome of one poll: either a list of payloads
/// or an error. Payload lists longer than [BatchLimits::max_records] are split over several polls.
/// Once all polls are consumed the source is finished.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use callstream::sources::{BatchSource, VecSource};
///
/// let mut source = VecSource::from_batches([vec![br#"{"original_crime_type_name": "Theft"}"#.to_vec()]]);
/// assert_eq!(source.poll_batch(Duration::ZERO).unwrap().len(), 1);
/// assert!(source.is_finished());
/// ```
pub struct VecSource {
    polls: VecDeque<Result<Vec<Vec<u8>>, BrokerError>>,
    limits: BatchLimits,
    commits: usize,
}

impl VecSource {
    /// Create a source from poll outcomes
    pub fn new(polls: impl IntoIterator<Item = Result<Vec<Vec<u8>>, BrokerError>>) -> Self {
        Self {
            polls: polls.into_iter().collect(),
            limits: BatchLimits::default(),
            commits: 0,
        }
    }

    /// Create a source which never fails
    pub fn from_batches(batches: impl IntoIterator<Item = Vec<Vec<u8>>>) -> Self {
        Self::new(batches.into_iter().map(Ok))
    }

    /// Override the batch limits
    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Number of times the engine committed a batch
    pub fn commits(&self) -> usize {
        self.commits
    }
}

impl BatchSource for VecSource {
    type Record = Vec<u8>;

    fn poll_batch(&mut self, _timeout: Duration) -> Result<Vec<Self::Record>, BrokerError> {
        let Some(next) = self.polls.pop_front() else {
            return Ok(Vec::new());
        };
        let mut batch = next?;
        // a zero limit would never hand out a record
        let max = self.limits.max_records.max(1);
        if batch.len() > max {
            let rest = batch.split_off(max);
            self.polls.push_front(Ok(rest));
        }
        Ok(batch)
    }

    fn commit(&mut self) {
        self.commits += 1;
    }

    fn is_finished(&mut self) -> bool {
        self.polls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_oversized_batches() {
        let payloads: Vec<Vec<u8>> = (0..5).map(|i| vec![i]).collect();
        let mut source = VecSource::from_batches([payloads]).with_limits(BatchLimits {
            max_records: 2,
            max_per_partition: 2,
        });
        let sizes: Vec<usize> = std::iter::from_fn(|| {
            (!source.is_finished()).then(|| source.poll_batch(Duration::ZERO).unwrap().len())
        })
        .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn zero_limit_still_drains() {
        let mut source = VecSource::from_batches([vec![vec![1], vec![2]]]).with_limits(BatchLimits {
            max_records: 0,
            max_per_partition: 0,
        });
        assert_eq!(source.poll_batch(Duration::ZERO).unwrap().len(), 1);
        assert_eq!(source.poll_batch(Duration::ZERO).unwrap().len(), 1);
        assert!(source.is_finished());
    }

    #[test]
    fn yields_errors_in_order() {
        let mut source = VecSource::new([
            Err(BrokerError::ConnectionLost("gone".into())),
            Ok(vec![b"{}".to_vec()]),
        ]);
        assert!(source.poll_batch(Duration::ZERO).is_err());
        assert_eq!(source.poll_batch(Duration::ZERO).unwrap().len(), 1);
        assert!(source.poll_batch(Duration::ZERO).unwrap().is_empty());
    }
}
