use std::path::Path;
use std::time::Duration;

use callstream_kafka::{KafkaRecord, KafkaSink};
use serde_json::Value;
use tracing::info;

use crate::Error;

/// Turn the contents of a call dump into records for `topic`, keyed by `crime_id`
pub(crate) fn records_from_json(text: &str, topic: &str) -> Result<Vec<KafkaRecord>, Error> {
    let Value::Array(calls) = serde_json::from_str::<Value>(text)? else {
        return Err(Error::NotAnArray);
    };
    Ok(calls
        .into_iter()
        .map(|call| {
            let key = match call.get("crime_id") {
                Some(Value::String(id)) => Some(id.clone().into_bytes()),
                Some(Value::Number(id)) => Some(id.to_string().into_bytes()),
                _ => None,
            };
            KafkaRecord::builder()
                .topic(topic)
                .payload(call.to_string().into_bytes())
                .maybe_key(key)
                .build()
        })
        .collect())
}

/// Produce every call of the file at `input` into the topic
pub(crate) fn replay(
    mut sink: KafkaSink,
    input: &Path,
    topic: &str,
    delay: Duration,
) -> Result<usize, Error> {
    let text = std::fs::read_to_string(input)?;
    let records = records_from_json(&text, topic)?;
    info!(records = records.len(), topic, "Replaying calls");
    for (i, record) in records.iter().enumerate() {
        sink.send(record)?;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if (i + 1) % 1000 == 0 {
            info!(sent = i + 1, "Replay progress");
        }
    }
    sink.flush(Duration::from_secs(30))?;
    Ok(records.len())
}
