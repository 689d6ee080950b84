//! The processing loop.
//!
//! A single loop owns the [AggregationContext]. Every iteration polls one micro-batch, applies
//! it completely and commits it, then asks the trigger whether a snapshot is due. Snapshots are
//! rendered on the same loop so they never observe a half applied batch.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};
use bon::Builder;
use tracing::{info, warn};

use crate::context::{AggregationContext, BatchProgress, EngineConfig};
use crate::errorhandling::{BrokerError, JobError};
use crate::sinks::SnapshotSink;
use crate::snapshot::{AggregationSnapshot, SnapshotTrigger};
use crate::sources::BatchSource;

/// Cooperative shutdown flag shared between the loop and whoever stops it.
/// Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    /// A flag which is not yet raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to stop after the in-flight batch
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether stop was requested
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bounded exponential backoff for broker failures
#[derive(Builder, Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first failed poll
    #[builder(default = 5)]
    pub max_retries: usize,
    /// Delay before the first retry, doubling on each further retry
    #[builder(default = Duration::from_millis(500))]
    pub min_delay: Duration,
    /// Upper bound on a single delay
    #[builder(default = Duration::from_secs(30))]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Result of a job which stopped without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// State at the time the job stopped
    pub final_snapshot: AggregationSnapshot,
    /// Micro-batches processed
    pub batches: u64,
    /// Snapshots emitted, including the final one
    pub emitted: u64,
}

/// A streaming aggregation from a [BatchSource] into a [SnapshotSink].
///
/// # Example
/// ```rust
/// use callstream::job::StreamingJob;
/// use callstream::sinks::VecSink;
/// use callstream::sources::VecSource;
///
/// let sink = VecSink::new();
/// let outcome = StreamingJob::builder()
///     .source(VecSource::from_batches([vec![
///         br#"{"original_crime_type_name": "Theft", "disposition": "A"}"#.to_vec(),
///     ]]))
///     .sink(sink.clone())
///     .trigger(|| true)
///     .build()
///     .run()
///     .unwrap();
/// assert_eq!(outcome.final_snapshot.counts(), vec![("Theft", 1)]);
/// ```
#[derive(Builder)]
pub struct StreamingJob<S, K, G> {
    source: S,
    sink: K,
    trigger: G,
    #[builder(default)]
    config: EngineConfig,
    #[builder(default)]
    retry: RetryPolicy,
    /// Longest time a single poll may block
    #[builder(default = Duration::from_secs(1))]
    max_poll_timeout: Duration,
    #[builder(default)]
    shutdown: Shutdown,
}

impl<S, K, G> StreamingJob<S, K, G>
where
    S: BatchSource,
    K: SnapshotSink,
    G: SnapshotTrigger,
{
    /// Run until the shutdown flag is raised or the source is finished.
    ///
    /// The batch in flight when shutdown is requested is applied completely. A final snapshot
    /// is emitted before returning.
    pub fn run(mut self) -> Result<JobOutcome, JobError> {
        let mut context = AggregationContext::new(&self.config);
        let mut emitted = 0;
        info!(config = ?self.config, "Starting streaming job");

        while !self.shutdown.is_triggered() {
            if self.source.is_finished() {
                info!("Source is finished");
                break;
            }
            let timeout = self
                .trigger
                .remaining()
                .map_or(self.max_poll_timeout, |r| r.min(self.max_poll_timeout));
            let batch = self.poll_with_retry(timeout)?;
            if !batch.is_empty() {
                let progress = context.process_batch(&batch);
                self.source.commit();
                report_progress(&progress);
            }
            if self.trigger.should_trigger() {
                self.emit(emitted, &context.render())?;
                emitted += 1;
            }
        }

        info!(batches = context.batches(), "Stopping streaming job");
        self.source.close();
        let final_snapshot = context.render();
        self.emit(emitted, &final_snapshot)?;
        self.sink.close().map_err(JobError::Sink)?;
        Ok(JobOutcome {
            final_snapshot,
            batches: context.batches(),
            emitted: emitted + 1,
        })
    }

    fn poll_with_retry(&mut self, timeout: Duration) -> Result<Vec<S::Record>, JobError> {
        let source = &mut self.source;
        let batch = (|| source.poll_batch(timeout))
            .retry(self.retry.backoff())
            .sleep(std::thread::sleep)
            .when(BrokerError::is_retryable)
            .notify(|err, delay| warn!(error = %err, ?delay, "Polling broker failed, retrying"))
            .call()?;
        Ok(batch)
    }

    fn emit(&mut self, batch_id: u64, snapshot: &AggregationSnapshot) -> Result<(), JobError> {
        self.sink.emit(batch_id, snapshot).map_err(JobError::Sink)
    }
}

fn report_progress(progress: &BatchProgress) {
    info!(
        batch_id = progress.batch_id,
        polled = progress.polled,
        malformed = progress.malformed,
        deduped = progress.deduped,
        counted = progress.counted,
        late = progress.late,
        evicted = progress.evicted,
        watermark = ?progress.watermark_after,
        live_keys = progress.live_keys,
        "Processed micro-batch"
    );
}
