//! The aggregation context owned by the processing loop.
use std::time::Duration;

use bon::Builder;
use tracing::debug;

use crate::aggregate::AggregationEngine;
use crate::decode::decode;
use crate::dedup::dedupe;
use crate::record::CallEvent;
use crate::snapshot::{render, AggregationSnapshot};
use crate::time::{EventTime, Timestamp};
use crate::watermark::{WatermarkTracker, DEFAULT_LATENESS};

/// Tuning of the aggregation
#[derive(Builder, Debug, Clone)]
pub struct EngineConfig {
    /// Bound on event-time out-of-orderness, events further behind are late
    #[builder(default = DEFAULT_LATENESS)]
    pub lateness: Duration,
    /// Extra time a finished window waits before it is evicted
    #[builder(default = Duration::ZERO)]
    pub allowed_lateness: Duration,
    /// Bound on live aggregation keys, unbounded if `None`
    pub max_keys: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Statistics of one processed micro-batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    /// Sequence number of the batch, starting at 0
    pub batch_id: u64,
    /// Raw records received
    pub polled: usize,
    /// Records decoded into calls
    pub decoded: usize,
    /// Records dropped because they could not be decoded
    pub malformed: usize,
    /// Distinct keys in the batch
    pub deduped: usize,
    /// Keys counted into the aggregation
    pub counted: usize,
    /// Keys dropped for being behind the watermark
    pub late: usize,
    /// Windows evicted after the batch
    pub evicted: usize,
    /// Watermark the batch was judged by, `None` before the first event time
    pub watermark_before: Option<EventTime>,
    /// Watermark after observing the batch's event times
    pub watermark_after: Option<EventTime>,
    /// Live aggregation keys after the batch
    pub live_keys: usize,
}

/// All mutable engine state: the watermark and the aggregation.
///
/// A context is owned by exactly one processing loop, independent contexts do not share state.
#[derive(Debug, Clone)]
pub struct AggregationContext {
    watermark: WatermarkTracker,
    aggregation: AggregationEngine,
    batches: u64,
}

impl Default for AggregationContext {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl AggregationContext {
    /// Create an empty context
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            watermark: WatermarkTracker::new(config.lateness),
            aggregation: AggregationEngine::new(config.allowed_lateness, config.max_keys),
            batches: 0,
        }
    }

    /// Process one micro-batch of raw payloads.
    ///
    /// The batch is evaluated against the watermark as it stood before the batch, the batch's
    /// own event times only move the watermark for later batches.
    /// Payloads which fail to decode are skipped.
    pub fn process_batch<R: AsRef<[u8]>>(&mut self, records: &[R]) -> BatchProgress {
        let batch_id = self.batches;
        self.batches += 1;

        let events: Vec<CallEvent> = records
            .iter()
            .filter_map(|raw| match decode(raw.as_ref()) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!(batch_id, error = %e, "Skipping undecodable record");
                    None
                }
            })
            .collect();
        self.apply_events(batch_id, records.len(), &events)
    }

    fn apply_events(&mut self, batch_id: u64, polled: usize, events: &[CallEvent]) -> BatchProgress {
        let watermark_before = self.watermark.current_watermark();
        for t in events.iter().filter_map(CallEvent::event_time) {
            self.watermark.observe(t);
        }
        let watermark_after = self.watermark.current_watermark();

        let deduped = dedupe(events);
        let outcome = self.aggregation.apply(&deduped, watermark_before);
        let evicted = self.aggregation.evict_expired(watermark_after).len();

        BatchProgress {
            batch_id,
            polled,
            decoded: events.len(),
            malformed: polled - events.len(),
            deduped: deduped.len(),
            counted: outcome.counted,
            late: outcome.late,
            evicted,
            watermark_before: known(watermark_before),
            watermark_after: known(watermark_after),
            live_keys: self.aggregation.len(),
        }
    }

    /// Render the complete current state
    pub fn render(&self) -> AggregationSnapshot {
        render(&self.aggregation)
    }

    /// Watermark the next batch is judged by
    pub fn current_watermark(&self) -> EventTime {
        self.watermark.current_watermark()
    }

    /// Read access to the per-type windows
    pub fn aggregation(&self) -> &AggregationEngine {
        &self.aggregation
    }

    /// Number of micro-batches processed
    pub fn batches(&self) -> u64 {
        self.batches
    }
}

fn known(watermark: EventTime) -> Option<EventTime> {
    (watermark != EventTime::MIN).then_some(watermark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{payload, payload_at};

    #[test]
    fn scenario_theft_and_robbery() {
        let mut ctx = AggregationContext::default();
        let batch = [
            br#"{"original_crime_type_name":"Theft","disposition":"A"}"#.to_vec(),
            br#"{"original_crime_type_name":"Theft","disposition":"A"}"#.to_vec(),
            br#"{"original_crime_type_name":"Robbery","disposition":"B"}"#.to_vec(),
        ];
        let progress = ctx.process_batch(&batch);
        assert_eq!(progress.deduped, 2);
        assert_eq!(progress.counted, 2);
        assert_eq!(ctx.aggregation().get("Theft").unwrap().count, 1);
        assert_eq!(ctx.aggregation().get("Robbery").unwrap().count, 1);
        assert_eq!(ctx.render().counts(), vec![("Robbery", 1), ("Theft", 1)]);
    }

    #[test]
    fn malformed_records_do_not_fail_the_batch() {
        let mut ctx = AggregationContext::default();
        let batch = [b"{oops".to_vec(), payload("Theft", "A"), b"[]".to_vec()];
        let progress = ctx.process_batch(&batch);
        assert_eq!(progress.polled, 3);
        assert_eq!(progress.decoded, 1);
        assert_eq!(progress.malformed, 2);
        assert_eq!(ctx.render().counts(), vec![("Theft", 1)]);
    }

    #[test]
    fn batch_is_judged_by_previous_watermark() {
        let mut ctx = AggregationContext::default();
        // the newer record moves the watermark to 09:00, but only for the next batch
        let first = [
            payload_at("Theft", "A", "2018-12-31T10:00:00"),
            payload_at("Robbery", "B", "2018-12-31T07:00:00"),
        ];
        let progress = ctx.process_batch(&first);
        assert_eq!(progress.counted, 2);
        assert_eq!(progress.late, 0);
        assert_eq!(progress.watermark_before, None);
        assert_eq!(progress.watermark_after, EventTime::parse("2018-12-31T09:00:00"));

        let second = [
            payload_at("Robbery", "B", "2018-12-31T08:59:59"),
            payload_at("Assault", "C", "2018-12-31T09:00:00"),
        ];
        let progress = ctx.process_batch(&second);
        assert_eq!(progress.late, 1);
        assert_eq!(progress.counted, 1);
        assert_eq!(ctx.aggregation().get("Robbery").unwrap().count, 1);
        assert_eq!(ctx.aggregation().get("Assault").unwrap().count, 1);
    }

    #[test]
    fn late_events_never_count() {
        let mut ctx = AggregationContext::default();
        ctx.process_batch(&[payload_at("Theft", "A", "2018-12-31T12:00:00")]);
        let watermark = ctx.current_watermark();
        for minute in 0..60 {
            let time = format!("2018-12-31T10:{minute:02}:00");
            ctx.process_batch(&[payload_at("Late", "X", &time)]);
        }
        assert!(EventTime::parse("2018-12-31T10:59:00").unwrap() < watermark);
        assert!(ctx.aggregation().get("Late").is_none());
    }

    #[test]
    fn independent_contexts_do_not_share_state() {
        let mut a = AggregationContext::default();
        let b = AggregationContext::default();
        a.process_batch(&[payload("Theft", "A")]);
        assert_eq!(a.render().len(), 1);
        assert!(b.render().is_empty());
        assert_eq!(a.batches(), 1);
        assert_eq!(b.batches(), 0);
    }

    #[test]
    fn config_builder_defaults() {
        let config = EngineConfig::builder().max_keys(10).build();
        assert_eq!(config.lateness, DEFAULT_LATENESS);
        assert_eq!(config.allowed_lateness, Duration::ZERO);
        assert_eq!(config.max_keys, Some(10));
    }
}
