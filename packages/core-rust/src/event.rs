//! Inbound event shapes and classification.
//!
//! A raw JSON event is classified by shape into one of three variants:
//!
//! - **REST**: carries an HTTP method and a path. Accepts the normalized
//!   `{method, path, queryParameters, pathParameters, body}` form as well as
//!   API Gateway HTTP API payloads (v2.0 `requestContext.http.method` +
//!   `rawPath`, and v1.0 `httpMethod` + `path`).
//! - **GraphQL**: carries a parent type and field name, either top-level or
//!   under `info` as AppSync direct resolvers send them.
//! - **Direct**: carries a bare `route` key.
//!
//! REST is checked first, then GraphQL, then Direct.

use std::collections::BTreeMap;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::route::RouteKind;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from classifying a raw event.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("event must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
    #[error("event has an unexpected shape: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("{kind} event is missing required field '{field}'")]
    MissingField { kind: RouteKind, field: &'static str },
    #[error("event matches no known shape (expected an HTTP method and path, a GraphQL field, or a route key)")]
    UnknownShape,
}

/// Errors from decoding a REST request body.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("request body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("request body is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("request body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A query-string value. Repeated keys keep every value in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

impl QueryValue {
    fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => {
                *self = Self::Multi(vec![std::mem::take(first), value]);
            }
            Self::Multi(values) => values.push(value),
        }
    }

    /// JSON form used in argument mappings: a string or an array of strings.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Single(v) => Value::String(v.clone()),
            Self::Multi(vs) => Value::Array(vs.iter().cloned().map(Value::String).collect()),
        }
    }
}

/// HTTP-shaped invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestEvent {
    /// Upper-cased HTTP verb.
    pub method: String,
    /// Raw request path as received (not yet normalized).
    pub path: String,
    pub query: BTreeMap<String, QueryValue>,
    /// Path parameters already bound by an upstream gateway, if any.
    pub path_parameters: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub is_base64_encoded: bool,
}

impl RestEvent {
    /// Builds a bare event with no query, headers, or body.
    #[must_use]
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query: BTreeMap::new(),
            path_parameters: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
            is_base64_encoded: false,
        }
    }

    /// Parses the body as JSON. An absent or blank body yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError`] when a base64 body fails to decode or the text
    /// is not JSON.
    pub fn json_body(&self) -> Result<Option<Value>, BodyError> {
        let Some(raw) = self.body.as_deref() else {
            return Ok(None);
        };

        let text = if self.is_base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD.decode(raw.trim())?;
            String::from_utf8(bytes)?
        } else {
            raw.to_string()
        };

        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }
}

/// GraphQL field resolution request.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlEvent {
    pub parent_type_name: String,
    pub field_name: String,
    pub arguments: Map<String, Value>,
}

/// Internal call addressed by an opaque route key.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectEvent {
    pub route: String,
    pub args: Map<String, Value>,
}

/// A classified inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Rest(RestEvent),
    Graphql(GraphqlEvent),
    Direct(DirectEvent),
}

impl InboundEvent {
    /// Classifies a raw JSON event by inspecting its shape.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError`] when the value is not an object, a field has
    /// the wrong JSON type, a partially-present shape lacks a required field,
    /// or no shape matches at all.
    pub fn classify(event: Value) -> Result<Self, ClassifyError> {
        if !event.is_object() {
            return Err(ClassifyError::NotAnObject {
                found: json_type_name(&event),
            });
        }

        let raw: RawEvent = serde_json::from_value(event).map_err(ClassifyError::Malformed)?;

        let method = raw
            .method
            .clone()
            .or_else(|| raw.request_context.as_ref().and_then(|c| c.http.as_ref()).map(|h| h.method.clone()))
            .or_else(|| raw.http_method.clone());
        if let Some(method) = method {
            return Ok(Self::Rest(raw.into_rest(&method)?));
        }

        let field_name = raw
            .field_name
            .clone()
            .or_else(|| raw.info.as_ref().and_then(|i| i.field_name.clone()));
        if let Some(field_name) = field_name {
            let parent_type_name = raw
                .parent_type_name
                .or_else(|| raw.info.and_then(|i| i.parent_type_name))
                .ok_or(ClassifyError::MissingField {
                    kind: RouteKind::Graphql,
                    field: "parentTypeName",
                })?;
            debug!(%parent_type_name, %field_name, "classified GraphQL event");
            return Ok(Self::Graphql(GraphqlEvent {
                parent_type_name,
                field_name,
                arguments: raw.arguments.unwrap_or_default(),
            }));
        }

        if let Some(route) = raw.route {
            debug!(%route, "classified direct event");
            return Ok(Self::Direct(DirectEvent {
                route,
                args: raw.args.unwrap_or_default(),
            }));
        }

        Err(ClassifyError::UnknownShape)
    }

    #[must_use]
    pub fn kind(&self) -> RouteKind {
        match self {
            Self::Rest(_) => RouteKind::Rest,
            Self::Graphql(_) => RouteKind::Graphql,
            Self::Direct(_) => RouteKind::Direct,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Raw wire shape
// ---------------------------------------------------------------------------

/// Union of every field any supported event shape may carry.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    method: Option<String>,
    http_method: Option<String>,
    path: Option<String>,
    raw_path: Option<String>,
    raw_query_string: Option<String>,
    query_parameters: Option<BTreeMap<String, QueryValue>>,
    query_string_parameters: Option<BTreeMap<String, QueryValue>>,
    multi_value_query_string_parameters: Option<BTreeMap<String, Vec<String>>>,
    path_parameters: Option<BTreeMap<String, String>>,
    headers: Option<BTreeMap<String, String>>,
    body: Option<String>,
    is_base64_encoded: Option<bool>,
    request_context: Option<RawRequestContext>,

    parent_type_name: Option<String>,
    field_name: Option<String>,
    info: Option<RawGraphqlInfo>,
    arguments: Option<Map<String, Value>>,

    route: Option<String>,
    args: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawRequestContext {
    http: Option<RawHttpContext>,
}

#[derive(Debug, Deserialize)]
struct RawHttpContext {
    method: String,
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGraphqlInfo {
    parent_type_name: Option<String>,
    field_name: Option<String>,
}

impl RawEvent {
    fn into_rest(self, method: &str) -> Result<RestEvent, ClassifyError> {
        let context_path = self
            .request_context
            .and_then(|c| c.http)
            .and_then(|h| h.path);
        let path = self
            .raw_path
            .or(self.path)
            .or(context_path)
            .ok_or(ClassifyError::MissingField {
                kind: RouteKind::Rest,
                field: "path",
            })?;

        // rawQueryString is the only source that keeps repeated keys exactly;
        // the v2 parameter map joins them with commas.
        let query = match self.raw_query_string.as_deref() {
            Some(raw) if !raw.is_empty() => parse_query_string(raw),
            _ => {
                if let Some(multi) = self.multi_value_query_string_parameters {
                    multi
                        .into_iter()
                        .map(|(k, mut vs)| {
                            let value = if vs.len() == 1 {
                                QueryValue::Single(vs.remove(0))
                            } else {
                                QueryValue::Multi(vs)
                            };
                            (k, value)
                        })
                        .collect()
                } else {
                    self.query_parameters
                        .or(self.query_string_parameters)
                        .unwrap_or_default()
                }
            }
        };

        let headers = self
            .headers
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        debug!(%method, %path, "classified REST event");
        Ok(RestEvent {
            method: method.to_ascii_uppercase(),
            path,
            query,
            path_parameters: self.path_parameters.unwrap_or_default(),
            headers,
            body: self.body,
            is_base64_encoded: self.is_base64_encoded.unwrap_or(false),
        })
    }
}

/// Parses a raw `a=1&b=2&a=3` query string, keeping repeated keys.
#[must_use]
pub fn parse_query_string(raw: &str) -> BTreeMap<String, QueryValue> {
    let mut query: BTreeMap<String, QueryValue> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match query.get_mut(key.as_ref()) {
            Some(existing) => existing.push(value.into_owned()),
            None => {
                query.insert(key.into_owned(), QueryValue::Single(value.into_owned()));
            }
        }
    }
    query
}
