//! 响应信封校验：结构化检查 `{ success, data, message?, errorCode?, timestamp }`。
//!
//! Response envelope contract.
//!
//! Every backend endpoint except `/health` wraps its payload as
//! `{ success, data, message?, errorCode?, timestamp }`. Validation is purely
//! structural: it never looks inside `data`.

use crate::error_kind::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire envelope produced by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub timestamp: f64,
}

/// Structural predicate: non-null object, boolean `success`, `data` key present
/// (any value, including null), numeric `timestamp`. No coercion.
pub fn is_valid_envelope(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    matches!(obj.get("success"), Some(Value::Bool(_)))
        && obj.contains_key("data")
        && matches!(obj.get("timestamp"), Some(Value::Number(_)))
}

/// Validate and split a JSON value into a typed envelope with an untyped payload.
pub fn parse_envelope(value: Value) -> Result<ApiResponse<Value>, ApiError> {
    if !is_valid_envelope(&value) {
        return Err(ApiError::unexpected_shape(describe_shape(&value)));
    }
    serde_json::from_value(value).map_err(|e| ApiError::unexpected_shape(e.to_string()))
}

fn describe_shape(value: &Value) -> String {
    match value {
        Value::Object(obj) => {
            let mut missing = Vec::new();
            if !matches!(obj.get("success"), Some(Value::Bool(_))) {
                missing.push("success");
            }
            if !obj.contains_key("data") {
                missing.push("data");
            }
            if !matches!(obj.get("timestamp"), Some(Value::Number(_))) {
                missing.push("timestamp");
            }
            format!("missing or mistyped fields: {}", missing.join(", "))
        }
        Value::Null => "null body".to_string(),
        Value::Array(_) => "array body".to_string(),
        _ => "primitive body".to_string(),
    }
}

/// A well-formed envelope that reported `success: false`, or an HTTP error
/// response that carried one.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationFailure {
    pub status: u16,
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub data: Value,
}

impl ApplicationFailure {
    pub fn from_envelope(status: u16, envelope: ApiResponse<Value>) -> Self {
        Self {
            status,
            message: envelope.message,
            error_code: envelope.error_code,
            data: envelope.data,
        }
    }

    /// Case-insensitive substring check on the backend message.
    pub fn message_contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.message
            .as_deref()
            .map(|m| m.to_lowercase().contains(&needle))
            .unwrap_or(false)
    }
}
