//! REST response envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// HTTP proxy response, serialized in the shape API gateways expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON-encoded payload.
    pub body: String,
    pub is_base64_encoded: bool,
}

impl RestResponse {
    /// A JSON response with the given status.
    #[must_use]
    pub fn json(status_code: u16, value: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), CONTENT_TYPE_JSON.to_string());
        Self {
            status_code,
            headers,
            body: value.to_string(),
            is_base64_encoded: false,
        }
    }

    /// `200 OK` wrapping a handler's return value.
    #[must_use]
    pub fn ok(value: &Value) -> Self {
        Self::json(200, value)
    }

    /// An error response whose body is `{"message": ...}`.
    #[must_use]
    pub fn error(status_code: u16, message: &str) -> Self {
        Self::json(status_code, &json!({ "message": message }))
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Parses the JSON body back into a value.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the body is not JSON.
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }

    /// The envelope as a JSON value, ready to hand back to a runtime.
    #[must_use]
    pub fn into_value(self) -> Value {
        json!({
            "statusCode": self.status_code,
            "headers": self.headers,
            "body": self.body,
            "isBase64Encoded": self.is_base64_encoded,
        })
    }
}
