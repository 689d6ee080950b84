use bon::Builder;
use rdkafka::{Message, message::BorrowedMessage, producer::BaseRecord};

/// A single record as received by or sent to Kafka
#[derive(Builder, Debug, Clone)]
#[builder(on(String, into))]
pub struct KafkaRecord {
    /// Topic the record came from or goes to
    pub topic: String,
    /// Partition, `None` lets the producer pick one
    pub partition: Option<i32>,
    /// Offset within the partition, only set on consumed records
    pub offset: Option<i64>,
    /// Raw value bytes, a JSON call record
    pub payload: Vec<u8>,
    /// Record key, the `crime_id` for replayed calls
    pub key: Option<Vec<u8>>,
    /// Broker or producer timestamp in epoch milliseconds
    pub timestamp: Option<i64>,
}

impl KafkaRecord {
    /// Returns `None` for records without payload
    pub(crate) fn from_message(msg: &BorrowedMessage<'_>) -> Option<Self> {
        let payload = msg.payload().map(|x| x.to_vec())?;
        Some(Self {
            topic: msg.topic().to_owned(),
            partition: Some(msg.partition()),
            offset: Some(msg.offset()),
            payload,
            key: msg.key().map(|x| x.to_vec()),
            timestamp: msg.timestamp().to_millis(),
        })
    }

    pub(crate) fn base_record(&self) -> BaseRecord<'_, Vec<u8>, Vec<u8>> {
        let mut base_record = BaseRecord::<Vec<u8>, Vec<u8>, ()>::to(&self.topic);
        base_record.partition = self.partition;
        base_record.payload = Some(&self.payload);
        base_record.key = self.key.as_ref();
        base_record.timestamp = self.timestamp;
        base_record
    }
}

impl AsRef<[u8]> for KafkaRecord {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::KafkaRecord;

    #[test]
    fn payload_is_the_record_bytes() {
        let record = KafkaRecord::builder()
            .topic("department.call.service.log")
            .payload(b"{}".to_vec())
            .key(b"183653763".to_vec())
            .build();
        assert_eq!(record.as_ref(), b"{}");
        let base = record.base_record();
        assert_eq!(base.topic, "department.call.service.log");
        assert_eq!(base.key, Some(&b"183653763".to_vec()));
        assert_eq!(base.partition, None);
    }
}
