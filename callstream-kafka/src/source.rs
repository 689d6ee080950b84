use std::collections::HashMap;
use std::time::{Duration, Instant};

use bon::Builder;
use callstream::errorhandling::BrokerError;
use callstream::sources::{BatchLimits, BatchSource};
use kafka_source_builder::SetAtLeastOneBroker;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, DefaultConsumerContext};
use rdkafka::{Offset, TopicPartitionList};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::KafkaRecord;

type KafkaPartition = i32;

/// Where to start consuming partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartingOffsets {
    /// The earliest offset still available on the broker
    #[default]
    Earliest,
    /// Only records produced after startup
    Latest,
}

impl StartingOffsets {
    fn offset(self) -> Offset {
        match self {
            StartingOffsets::Earliest => Offset::Beginning,
            StartingOffsets::Latest => Offset::End,
        }
    }

    fn auto_offset_reset(self) -> &'static str {
        match self {
            StartingOffsets::Earliest => "earliest",
            StartingOffsets::Latest => "latest",
        }
    }
}

/// Configuration of a Kafka topic consumed in micro-batches.
/// Every Kafka partition is read by its own consumer so a micro-batch can take at most
/// [BatchLimits::max_per_partition] records from each partition.
/// NOTE: Records with an empty payload are skipped.
///
/// # Usage
///
/// The source can be instantiated using the builder.
/// Custom [rdkafka configuration](https://github.com/confluentinc/librdkafka/blob/master/CONFIGURATION.md)
/// can be provided by calling `.conf(key, value)`.
///
/// ```
/// use callstream_kafka::KafkaSource;
///
/// let kafka_source = KafkaSource::builder()
///     .broker("localhost:9092") // at least one broker must be provided
///     .topic("department.call.service.log")
///     .group_id("callstream")
///     .conf("log_level", "3") // additional custom config
///     .build();
/// ```
#[derive(Builder, Debug)]
#[builder(on(String, into))]
pub struct KafkaSource {
    #[builder(field)]
    kafka_config: HashMap<String, String>,
    #[builder(field)]
    brokers: Vec<String>,
    /// set by every `broker` call, so `build` is only reachable with a broker
    #[builder(overwritable, setters(vis = "", name = "at_least_one_broker"))]
    _at_least_one_broker: (),
    topic: String,
    group_id: String,
    #[builder(default)]
    starting_offsets: StartingOffsets,
    #[builder(default)]
    limits: BatchLimits,
    /// Timeout for reaching the broker and fetching topic metadata at startup
    #[builder(default = Duration::from_secs(10))]
    metadata_fetch_timeout: Duration,
    /// Pause between polling rounds which found no records
    #[builder(default = Duration::from_millis(20))]
    idle_backoff: Duration,
}

impl<S: kafka_source_builder::State> KafkaSourceBuilder<S> {
    /// Provide an additional config for the Kafka consumer.
    /// Note that `bootstrap.servers`, `group.id`, `auto.offset.reset` and `enable.auto.commit`
    /// configs are ignored. Use the respective builder methods to supply these
    pub fn conf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kafka_config.insert(key.into(), value.into());
        self
    }
    /// Add a broker URL to consume from
    pub fn broker(mut self, url: impl Into<String>) -> KafkaSourceBuilder<SetAtLeastOneBroker<S>> {
        self.brokers.push(url.into());
        self.at_least_one_broker(())
    }
}

impl KafkaSource {
    /// Connect to the broker and assign a consumer to every partition of the topic.
    ///
    /// Fails with [BrokerError::ConnectTimeout] if the topic metadata can not be fetched within
    /// the metadata fetch timeout.
    pub fn connect(self) -> Result<KafkaBatchSource, BrokerError> {
        let timeout = self.metadata_fetch_timeout;
        let startup = |e: KafkaConsumerError| BrokerError::ConnectTimeout(timeout, Box::new(e));

        let parts = self.list_parts().map_err(startup)?;
        let partitions = parts
            .iter()
            .map(|part| self.build_part(*part))
            .collect::<Result<Vec<_>, _>>()
            .map_err(startup)?;
        info!(
            topic = %self.topic,
            partitions = partitions.len(),
            starting_offsets = ?self.starting_offsets,
            "Connected Kafka source"
        );
        Ok(KafkaBatchSource::new(
            partitions
                .into_iter()
                .map(|p| Box::new(p) as Box<dyn PartitionReader>)
                .collect(),
            self.limits,
            self.idle_backoff,
        ))
    }

    fn list_parts(&self) -> Result<Vec<KafkaPartition>, KafkaConsumerError> {
        let consumer = self.create_consumer()?;
        let metadata = consumer
            .fetch_metadata(Some(self.topic.as_str()), self.metadata_fetch_timeout)
            .map_err(KafkaConsumerError::FetchMetadata)?;
        // we selected a single topic beforehand
        let topic = metadata
            .topics()
            .first()
            .ok_or_else(|| KafkaConsumerError::UnknownTopic(self.topic.clone()))?;
        if topic.error().is_some() || topic.partitions().is_empty() {
            return Err(KafkaConsumerError::UnknownTopic(self.topic.clone()));
        }
        Ok(topic.partitions().iter().map(|x| x.id()).collect())
    }

    fn build_part(&self, part: KafkaPartition) -> Result<KafkaSourcePartition, KafkaConsumerError> {
        let consumer = self.create_consumer()?;
        let mut topic_partitions = TopicPartitionList::with_capacity(1);
        topic_partitions
            .add_partition_offset(&self.topic, part, self.starting_offsets.offset())
            .map_err(KafkaConsumerError::TopicPartition)?;
        consumer
            .assign(&topic_partitions)
            .map_err(KafkaConsumerError::TopicPartition)?;
        Ok(KafkaSourcePartition::new(consumer, &self.topic, part))
    }

    fn create_consumer(&self) -> Result<BaseConsumer, KafkaConsumerError> {
        let mut kafka_conf = ClientConfig::new();
        for (k, v) in self.kafka_config.iter() {
            kafka_conf.set(k, v);
        }
        kafka_conf
            .set("group.id", &self.group_id)
            .set("bootstrap.servers", self.brokers.join(","))
            .set("auto.offset.reset", self.starting_offsets.auto_offset_reset())
            .set("enable.auto.commit", "false");
        kafka_conf
            .create()
            .map_err(KafkaConsumerError::CreateConsumer)
    }
}

/// Reads records of a single partition.
trait PartitionReader: Send {
    /// Next record with a payload, `None` if nothing is buffered
    fn poll(&mut self) -> Result<Option<KafkaRecord>, KafkaConsumerError>;
    /// Commit everything handed out so far
    fn commit(&mut self, mode: CommitMode);
}

/// A connected [KafkaSource]. Batches are assembled round robin over the partitions.
pub struct KafkaBatchSource {
    partitions: Vec<Box<dyn PartitionReader>>,
    limits: BatchLimits,
    idle_backoff: Duration,
    // partition the next round starts at, so no partition is favoured
    next_partition: usize,
    // failure seen after records were already taken off the consumers
    deferred_error: Option<KafkaConsumerError>,
}

impl KafkaBatchSource {
    fn new(partitions: Vec<Box<dyn PartitionReader>>, limits: BatchLimits, idle_backoff: Duration) -> Self {
        Self {
            partitions,
            limits,
            idle_backoff,
            next_partition: 0,
            deferred_error: None,
        }
    }

    /// Number of assigned partitions
    pub fn partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Upper bound on the size of a single batch
    pub fn max_batch_size(&self) -> usize {
        self.limits
            .max_records
            .min(self.limits.max_per_partition.saturating_mul(self.partitions.len()))
    }
}

impl BatchSource for KafkaBatchSource {
    type Record = KafkaRecord;

    /// Records already received are never dropped: if a partition fails after others
    /// contributed records, those records are returned and the failure is reported by the
    /// next poll.
    fn poll_batch(&mut self, timeout: Duration) -> Result<Vec<KafkaRecord>, BrokerError> {
        if let Some(e) = self.deferred_error.take() {
            return Err(e.into());
        }
        let deadline = Instant::now() + timeout;
        let max = self.max_batch_size();
        let part_count = self.partitions.len();
        let mut batch = Vec::with_capacity(max);
        let mut taken = vec![0usize; part_count];

        while batch.len() < max {
            let mut progressed = false;
            for step in 0..part_count {
                let idx = (self.next_partition + step) % part_count;
                if batch.len() >= max || taken[idx] >= self.limits.max_per_partition {
                    continue;
                }
                match self.partitions[idx].poll() {
                    Ok(Some(record)) => {
                        batch.push(record);
                        taken[idx] += 1;
                        progressed = true;
                    }
                    Ok(None) => (),
                    Err(e) if batch.is_empty() => return Err(e.into()),
                    Err(e) => {
                        warn!(error = %e, records = batch.len(), "Partition poll failed, handing out partial batch");
                        self.deferred_error = Some(e);
                        return Ok(self.finish_batch(batch));
                    }
                }
            }
            if progressed {
                continue;
            }
            // nothing new in this round, hand out what we have or wait for more
            if !batch.is_empty() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(self.idle_backoff.min(deadline - now));
        }
        Ok(self.finish_batch(batch))
    }

    fn commit(&mut self) {
        for part in self.partitions.iter_mut() {
            part.commit(CommitMode::Async);
        }
    }

    fn close(&mut self) {
        for part in self.partitions.iter_mut() {
            part.commit(CommitMode::Sync);
        }
    }
}

impl KafkaBatchSource {
    fn finish_batch(&mut self, batch: Vec<KafkaRecord>) -> Vec<KafkaRecord> {
        if !self.partitions.is_empty() {
            self.next_partition = (self.next_partition + 1) % self.partitions.len();
        }
        debug!(records = batch.len(), "Polled Kafka batch");
        batch
    }
}

/// A single partition of [KafkaSource].
/// This type can not be constructed directly, use [KafkaSource] instead.
struct KafkaSourcePartition {
    consumer: BaseConsumer<DefaultConsumerContext>,
    topic: String,
    partition: KafkaPartition,
    // offset of the last received record
    last_recvd_offset: Option<i64>,
    last_committed_offset: Option<i64>,
}

impl KafkaSourcePartition {
    fn new(consumer: BaseConsumer<DefaultConsumerContext>, topic: &str, partition: KafkaPartition) -> Self {
        Self {
            consumer,
            topic: topic.to_owned(),
            partition,
            last_recvd_offset: None,
            last_committed_offset: None,
        }
    }

}

impl PartitionReader for KafkaSourcePartition {
    fn poll(&mut self) -> Result<Option<KafkaRecord>, KafkaConsumerError> {
        loop {
            let Some(msg) = self.consumer.poll(Duration::ZERO) else {
                return Ok(None);
            };
            let msg = msg.map_err(KafkaConsumerError::Poll)?;
            self.last_recvd_offset = Some(rdkafka::Message::offset(&msg));
            if let Some(record) = KafkaRecord::from_message(&msg) {
                return Ok(Some(record));
            }
        }
    }

    fn commit(&mut self, mode: CommitMode) {
        let Some(offset) = self.last_recvd_offset else {
            return;
        };
        if self.last_committed_offset == Some(offset) {
            return;
        }
        let mut tpl = TopicPartitionList::new();
        // the committed offset is the next one to consume
        if let Err(e) = tpl.add_partition_offset(&self.topic, self.partition, Offset::Offset(offset + 1)) {
            error!("Error building commit for partition {}: {e}", self.partition);
            return;
        }
        // a failed commit is a soft error, the next commit includes the offset again
        match self.consumer.commit(&tpl, mode) {
            Ok(()) => self.last_committed_offset = Some(offset),
            Err(e) => error!("Error committing offset to Kafka: {e}"),
        }
    }
}

/// Possible errors which can occur in the KafkaConsumer
#[derive(Debug, Error)]
pub enum KafkaConsumerError {
    /// A partition consumer returned an error
    #[error("Error polling Kafka consumer")]
    Poll(#[source] rdkafka::error::KafkaError),
    /// The client could not be created from the config
    #[error("Failed to create Kafka consumer")]
    CreateConsumer(#[source] rdkafka::error::KafkaError),
    /// Assigning or committing a partition failed
    #[error("Could not assign topic-partition to consumer")]
    TopicPartition(#[source] rdkafka::error::KafkaError),
    /// The broker did not answer the metadata request
    #[error("Failed to fetch metadata from Kafka broker")]
    FetchMetadata(#[source] rdkafka::error::KafkaError),
    /// The topic is unknown to the broker
    #[error("Topic `{0}` does not exist or has no partitions")]
    UnknownTopic(String),
}

impl From<KafkaConsumerError> for BrokerError {
    fn from(value: KafkaConsumerError) -> Self {
        BrokerError::ConnectionLost(Box::new(value))
    }
}

/// Incomplete builders are rejected at compile time.
/// without a broker
/// ```compile_fail
/// use callstream_kafka::KafkaSource;
/// KafkaSource::builder()
/// .topic("foobar")
/// .group_id("groupid")
/// .build();
/// ```
/// without a topic
/// ```compile_fail
/// use callstream_kafka::KafkaSource;
/// KafkaSource::builder()
/// .group_id("groupid")
/// .broker("broker.com")
/// .build();
/// ```
/// without a group id
/// ```compile_fail
/// use callstream_kafka::KafkaSource;
/// KafkaSource::builder()
/// .topic("foobar")
/// .broker("broker.com")
/// .build();
/// ```
struct _CompileTests;
