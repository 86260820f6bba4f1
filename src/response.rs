//! Response decoding
//!
//! Servers, WordPress ones in particular, often print PHP notices or HTML around the API
//! output. [`remove_junk`] digs the JSON document out of such a body before it is decoded
//! into the shape shared by both API versions.

use crate::options::View;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on candidate start positions tried while looking for JSON in a body
const MAX_JUNK_ATTEMPTS: usize = 1000;

/// Longest excerpt of a bad body quoted in errors
const MAX_EXCERPT: usize = 512;

/// Decoded API response, identical for v1 and v2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Response body
    pub body: ApiBody,
}

/// Status and payload of an API response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiBody {
    /// HTTP-like status; 200 means success
    pub status: i64,
    /// Method-specific payload
    pub data: Value,
}

impl ApiResponse {
    /// Create a response
    pub fn new(status: i64, data: Value) -> Self {
        Self {
            body: ApiBody { status, data },
        }
    }

    /// Status reported by the API
    pub fn status(&self) -> i64 {
        self.body.status
    }

    /// Whether the status is 200
    pub fn is_success(&self) -> bool {
        self.body.status == 200
    }

    /// The payload
    pub fn data(&self) -> &Value {
        &self.body.data
    }

    /// Take the payload
    pub fn into_data(self) -> Value {
        self.body.data
    }

    /// Deserialize the payload
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.body.data).map_err(|e| {
            tracing::debug!("Unexpected response payload: {}", e);
            Error::InvalidJSONBody
        })
    }

    /// The payload as an error message: strings verbatim, anything else as JSON
    pub fn message(&self) -> String {
        match &self.body.data {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// `RemoteError` carrying this response's status and message
    pub fn remote_error(&self) -> Error {
        Error::RemoteError {
            status: self.status(),
            message: self.message(),
        }
    }
}

/// Find the API's JSON document inside a response body.
///
/// Tried in order: text between the first and last `###` marker, the whole body if it
/// is valid JSON, then the span from a `{` to the last `}`, moving the start to the
/// next `{` each time the span fails to decode.
pub fn remove_junk(raw: &str) -> Option<&str> {
    if let (Some(start), Some(end)) = (raw.find("###"), raw.rfind("###")) {
        if end >= start + 3 {
            return Some(&raw[start + 3..end]);
        }
    }

    if decodes(raw) {
        return Some(raw);
    }

    let open = raw.find('{')?;
    let close = raw.rfind('}')?;

    if close < open {
        return None;
    }

    let mut candidate = &raw[open..=close];

    for _ in 0..MAX_JUNK_ATTEMPTS {
        if decodes(candidate) {
            return Some(candidate);
        }

        let next = candidate.get(1..)?.find('{')? + 1;
        candidate = &candidate[next..];
    }

    None
}

/// Strip junk from a raw body and decode it according to the API version.
pub fn decode(view: Option<View>, raw: &str) -> Result<ApiResponse> {
    let Some(clean) = remove_junk(raw) else {
        return Err(Error::InvalidEncapsulatedJSON(excerpt(raw)));
    };

    match view {
        Some(View::Api) => decode_v2(clean),
        Some(View::Json) | None => decode_v1(clean),
    }
}

/// v1: `{"body":{"status":200,"data":"<json>"}}` with the payload JSON-encoded again
pub fn decode_v1(text: &str) -> Result<ApiResponse> {
    let invalid = || Error::InvalidEncapsulatedJSON(excerpt(text));

    let envelope: Value = serde_json::from_str(text).map_err(|_| invalid())?;
    let body = envelope.get("body").filter(|b| b.is_object()).ok_or_else(invalid)?;
    let data = body.get("data").ok_or_else(invalid)?;

    let data = match data {
        Value::String(encoded) => serde_json::from_str::<Value>(encoded).unwrap_or(Value::Null),
        _ => Value::Null,
    };

    if data.is_null() {
        return Err(Error::InvalidJSONBody);
    }

    let status = body.get("status").and_then(status_value).unwrap_or(0);

    Ok(ApiResponse::new(status, data))
}

/// v2: `{"status":200,"data":<payload>}`
pub fn decode_v2(text: &str) -> Result<ApiResponse> {
    let invalid = || Error::InvalidEncapsulatedJSON(excerpt(text));

    let document: Value = serde_json::from_str(text).map_err(|_| invalid())?;
    let status = document.get("status").ok_or_else(invalid)?;
    let data = document.get("data").ok_or_else(invalid)?;
    let status = status_value(status).ok_or_else(invalid)?;

    Ok(ApiResponse::new(status, data.clone()))
}

fn decodes(text: &str) -> bool {
    matches!(serde_json::from_str::<Value>(text), Ok(value) if !value.is_null())
}

fn status_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn excerpt(raw: &str) -> String {
    match raw.char_indices().nth(MAX_EXCERPT) {
        Some((end, _)) => format!("{}…", &raw[..end]),
        None => raw.to_string(),
    }
}
