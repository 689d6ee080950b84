use std::{collections::HashMap, time::Duration};

use bon::bon;
use kafka_sink_builder::SetAtLeastOneBroker;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{BaseProducer, DefaultProducerContext, Producer};
use rdkafka::ClientConfig;
use thiserror::Error;
use tracing::debug;

use crate::KafkaRecord;

/// How long to wait for the producer queue to drain when it is full
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(100);

/// Produces [KafkaRecord]s, used to replay call records into a topic.
pub struct KafkaSink {
    producer: BaseProducer<DefaultProducerContext>,
}

#[bon]
impl KafkaSink {
    /// Create a producer, use [KafkaSink::builder]
    #[builder]
    #[builder(on(String, into))]
    pub fn new(
        #[builder(field)] kafka_config: HashMap<String, String>,
        #[builder(field)] brokers: Vec<String>,
        /// set by every `broker` call, so `build` is only reachable with a broker
        #[builder(overwritable, setters(vis = "", name = "at_least_one_broker"))]
        _at_least_one_broker: (),
        client_id: String,
    ) -> Result<Self, KafkaProducerError> {
        let mut kafka_conf = ClientConfig::new();
        for (k, v) in kafka_config.iter() {
            kafka_conf.set(k, v);
        }
        let producer = kafka_conf
            .set("client.id", client_id)
            .set("bootstrap.servers", brokers.join(","))
            .create()
            .map_err(KafkaProducerError::CreateProducer)?;
        Ok(Self { producer })
    }
}

impl<S: kafka_sink_builder::State> KafkaSinkBuilder<S> {
    /// Set a raw librdkafka producer option.
    /// `bootstrap.servers` and `client.id` are overwritten by `broker` and `client_id`.
    pub fn conf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kafka_config.insert(key.into(), value.into());
        self
    }
    /// Add a broker URL to produce records to
    pub fn broker(mut self, url: impl Into<String>) -> KafkaSinkBuilder<SetAtLeastOneBroker<S>> {
        self.brokers.push(url.into());
        self.at_least_one_broker(())
    }
}

impl KafkaSink {
    /// Enqueue a record for delivery, waiting for room if the local queue is full
    pub fn send(&mut self, record: &KafkaRecord) -> Result<(), KafkaProducerError> {
        let mut base_record = record.base_record();
        loop {
            match self.producer.send(base_record) {
                Ok(()) => break,
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), returned)) => {
                    debug!("Producer queue full, waiting");
                    self.producer.poll(QUEUE_FULL_BACKOFF);
                    base_record = returned;
                }
                Err((e, _)) => return Err(KafkaProducerError::Send(e)),
            }
        }
        // serve delivery callbacks
        self.producer.poll(Duration::ZERO);
        Ok(())
    }

    /// Wait until all enqueued records are delivered
    pub fn flush(&mut self, timeout: Duration) -> Result<(), KafkaProducerError> {
        self.producer.flush(timeout).map_err(KafkaProducerError::Flush)
    }
}

/// Errors of the [KafkaSink]
#[derive(Debug, Error)]
pub enum KafkaProducerError {
    /// The record could not be enqueued
    #[error("Failed to send message")]
    Send(#[source] KafkaError),
    /// The client could not be created from the config
    #[error("Failed to create Kafka Producer")]
    CreateProducer(#[source] KafkaError),
    /// Not all records were delivered within the timeout
    #[error("Failed to flush Kafka Producer")]
    Flush(#[source] KafkaError),
}

/// Incomplete builders are rejected at compile time.
/// without a broker
/// ```compile_fail
/// use callstream_kafka::KafkaSink;
/// KafkaSink::builder()
/// .client_id("replay")
/// .build();
/// ```
/// without a client id
/// ```compile_fail
/// use callstream_kafka::KafkaSink;
/// KafkaSink::builder()
/// .broker("broker.com")
/// .build();
/// ```
struct _CompileTests;

#[cfg(test)]
mod tests {
    use super::KafkaSink;

    #[test]
    fn builds_without_connecting() {
        let _sink = KafkaSink::builder()
            .broker("foo.com")
            .client_id("replay")
            .conf("log_level", "3")
            .build()
            .unwrap();
    }
}
