//! Builders for calls and payloads used across unit tests.
use serde_json::json;

use crate::record::CallEvent;

/// A call with the given type, disposition and `call_date_time`
pub(crate) fn call(crime_type: &str, disposition: &str, call_date_time: &str) -> CallEvent {
    CallEvent {
        original_crime_type_name: crime_type.to_owned(),
        disposition: disposition.to_owned(),
        call_date_time: call_date_time.to_owned(),
        ..Default::default()
    }
}

/// JSON payload of a call without event time
pub(crate) fn payload(crime_type: &str, disposition: &str) -> Vec<u8> {
    json!({
        "original_crime_type_name": crime_type,
        "disposition": disposition,
    })
    .to_string()
    .into_bytes()
}

/// JSON payload of a call at the given `call_date_time`
pub(crate) fn payload_at(crime_type: &str, disposition: &str, call_date_time: &str) -> Vec<u8> {
    json!({
        "crime_id": "1",
        "original_crime_type_name": crime_type,
        "disposition": disposition,
        "call_date_time": call_date_time,
        "city": "San Francisco",
        "state": "CA",
    })
    .to_string()
    .into_bytes()
}
