//! Listing response envelope
//!
//! The endpoint answers either with a bare JSON array of items or with
//! `{ "items": [...], "total": n }`.

use crate::error::FetchError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decoded listing body.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// `total` was not supplied by the server and equals `items.len()`.
    pub total_inferred: bool,
}

pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<Envelope<T>, FetchError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| FetchError::Transport(format!("malformed JSON body: {}", e)))?;

    let (raw_items, reported_total) = match value {
        Value::Array(items) => (items, None),
        Value::Object(mut object) => {
            let total = object.get("total").and_then(numeric_total);
            match object.remove("items") {
                Some(Value::Array(items)) => (items, total),
                Some(other) => {
                    return Err(FetchError::Transport(format!(
                        "'items' must be an array, got {}",
                        json_type(&other)
                    )))
                }
                // No items field: the object itself is the payload.
                None => (vec![Value::Object(object)], total),
            }
        }
        other => {
            return Err(FetchError::Transport(format!(
                "expected array or object body, got {}",
                json_type(&other)
            )))
        }
    };

    let items = raw_items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| FetchError::Transport(format!("failed to decode listing item: {}", e)))?;

    let total_inferred = reported_total.is_none();
    let total = reported_total.unwrap_or(items.len() as u64);

    Ok(Envelope {
        items,
        total,
        total_inferred,
    })
}

fn numeric_total(value: &Value) -> Option<u64> {
    if let Some(total) = value.as_u64() {
        return Some(total);
    }
    value
        .as_f64()
        .filter(|total| total.is_finite() && *total >= 0.0)
        .map(|total| total as u64)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
