//! Kafka connectivity for callstream: a partition-aware micro-batch source and a producer.
mod record;
mod sink;
mod source;

pub use record::KafkaRecord;
pub use sink::{KafkaProducerError, KafkaSink};
pub use source::{KafkaBatchSource, KafkaConsumerError, KafkaSource, StartingOffsets};
