//! Decoding raw broker payloads into [CallEvent]s.
use crate::errorhandling::DecodeError;
use crate::record::CallEvent;

/// Decode a UTF-8 JSON object into a [CallEvent].
///
/// Missing fields decode to empty strings. Anything which is not valid UTF-8, not valid JSON
/// or not a JSON object fails with [DecodeError::MalformedPayload].
pub fn decode(raw: &[u8]) -> Result<CallEvent, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;
    if !value.is_object() {
        return Err(DecodeError::MalformedPayload(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }
    serde_json::from_value(value).map_err(|e| DecodeError::MalformedPayload(e.to_string()))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
