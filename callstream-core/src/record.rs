//! The call record as it arrives from the broker and the key it is deduplicated by.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::time::EventTime;

/// Names of the fields in a call record, in schema order.
pub const CALL_EVENT_FIELDS: [&str; 14] = [
    "crime_id",
    "original_crime_type_name",
    "report_date",
    "call_date",
    "offense_date",
    "call_time",
    "call_date_time",
    "disposition",
    "address",
    "city",
    "state",
    "agency_id",
    "address_type",
    "common_location",
];

/// One decoded service call.
///
/// Every field is optional on the wire: a missing or `null` field decodes to an empty string,
/// numbers and booleans decode to their JSON text. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallEvent {
    /// Identifier assigned by the department
    #[serde(deserialize_with = "lenient_string")]
    pub crime_id: String,
    /// Call type as entered by the dispatcher, the aggregation key
    #[serde(deserialize_with = "lenient_string")]
    pub original_crime_type_name: String,
    /// Date the call was reported
    #[serde(deserialize_with = "lenient_string")]
    pub report_date: String,
    /// Date the call came in
    #[serde(deserialize_with = "lenient_string")]
    pub call_date: String,
    /// Date of the offense
    #[serde(deserialize_with = "lenient_string")]
    pub offense_date: String,
    /// Time of day the call came in, `HH:MM`
    #[serde(deserialize_with = "lenient_string")]
    pub call_time: String,
    /// Timestamp of the call, the event time
    #[serde(deserialize_with = "lenient_string")]
    pub call_date_time: String,
    /// Radio code of the call outcome, joined against the reference file
    #[serde(deserialize_with = "lenient_string")]
    pub disposition: String,
    /// Street address of the incident
    #[serde(deserialize_with = "lenient_string")]
    pub address: String,
    /// City of the incident
    #[serde(deserialize_with = "lenient_string")]
    pub city: String,
    /// State of the incident
    #[serde(deserialize_with = "lenient_string")]
    pub state: String,
    /// Responding agency
    #[serde(deserialize_with = "lenient_string")]
    pub agency_id: String,
    /// Kind of address, e.g. premise or intersection
    #[serde(deserialize_with = "lenient_string")]
    pub address_type: String,
    /// Well known name of the location, if any
    #[serde(deserialize_with = "lenient_string")]
    pub common_location: String,
}

impl CallEvent {
    /// Event time of this call, `None` if `call_date_time` is missing or unparseable
    pub fn event_time(&self) -> Option<EventTime> {
        EventTime::parse(&self.call_date_time)
    }

    /// The dedup key of this call or `None` if it has no call type
    pub fn dedup_key(&self) -> Option<DedupKey> {
        let crime_type = self.original_crime_type_name.trim();
        if crime_type.is_empty() {
            return None;
        }
        Some(DedupKey {
            original_crime_type_name: crime_type.to_owned(),
            disposition: self.disposition.trim().to_owned(),
        })
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Pair of call type and disposition. Within one micro-batch every key feeds into
/// the aggregation at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    /// Trimmed call type, never empty
    pub original_crime_type_name: String,
    /// Trimmed disposition, may be empty
    pub disposition: String,
}

impl DedupKey {
    /// Create a new key
    pub fn new(original_crime_type_name: impl Into<String>, disposition: impl Into<String>) -> Self {
        Self {
            original_crime_type_name: original_crime_type_name.into(),
            disposition: disposition.into(),
        }
    }
}
