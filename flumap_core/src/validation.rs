//! Response Validator - structural check of a fetched choropleth payload.
//!
//! A payload is accepted only when it is a JSON object whose `data` member
//! is an array of trace objects. Anything else is `MalformedPayload`, which
//! the fetch controller treats as retryable.
//!
//! ```ignore
//! let payload = validate_body(&response.body)?;
//! assert!(!payload.data.is_empty());
//! ```

use crate::error::FetchError;
use crate::payload::{BoundsEnvelope, ChoroplethPayload, Trace};
use serde_json::{Map, Value};

/// Characters of an unparsable body quoted in the error.
const BODY_PREVIEW_CHARS: usize = 100;

/// Parses and validates a response body.
pub fn validate_body(body: &str) -> Result<ChoroplethPayload, FetchError> {
    let value: Value = serde_json::from_str(body).map_err(|_| {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        FetchError::malformed(format!("Failed to parse response: {}...", preview))
    })?;
    validate_value(value)
}

/// Validates an already-parsed body.
pub fn validate_value(value: Value) -> Result<ChoroplethPayload, FetchError> {
    let Value::Object(mut root) = value else {
        return Err(missing_data());
    };

    let items = match root.remove("data") {
        Some(Value::Array(items)) => items,
        _ => return Err(missing_data()),
    };

    let data = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_trace(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    let layout = match root.remove("layout") {
        Some(Value::Object(layout)) => layout,
        _ => Map::new(),
    };

    let bounds = match root.remove("bounds") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(parse_bounds(raw)?),
    };

    Ok(ChoroplethPayload {
        data,
        layout,
        bounds,
    })
}

fn missing_data() -> FetchError {
    FetchError::malformed("Invalid response format: missing data array")
}

fn parse_trace(index: usize, item: Value) -> Result<Trace, FetchError> {
    if !item.is_object() {
        return Err(FetchError::malformed(format!(
            "Invalid response format: trace {} is not an object",
            index
        )));
    }
    serde_json::from_value(item).map_err(|e| {
        FetchError::malformed(format!("Invalid response format: trace {}: {}", index, e))
    })
}

fn parse_bounds(raw: Value) -> Result<BoundsEnvelope, FetchError> {
    let envelope: BoundsEnvelope = serde_json::from_value(raw)
        .map_err(|e| FetchError::malformed(format!("Invalid bounds: {}", e)))?;
    if !envelope.bounds.is_finite() {
        return Err(FetchError::malformed("Invalid bounds: non-finite coordinate"));
    }
    Ok(envelope)
}
