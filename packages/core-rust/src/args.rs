//! Extracted invocation arguments.
//!
//! Handlers receive an [`Arguments`] mapping rather than positional
//! parameters. For REST events it holds path bindings, query values
//! (repeated keys as arrays), and the parsed JSON body under `body`. For
//! GraphQL and direct events it holds the event's argument object as-is.
//! Keys keep the naming convention they arrived with.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::event::{BodyError, RestEvent};

/// Key under which a parsed REST body is stored.
pub const BODY_KEY: &str = "body";

/// Errors from reading a required or typed argument.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("missing required argument '{name}'")]
    Missing { name: String },
    #[error("argument '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

/// Argument mapping passed to a handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds the mapping for a REST event.
    ///
    /// Precedence, lowest to highest: query values, path parameters supplied
    /// by an upstream gateway, wildcard bindings from the matched pattern,
    /// then the parsed body under [`BODY_KEY`].
    ///
    /// # Errors
    ///
    /// Returns [`BodyError`] when the body is present but cannot be decoded.
    pub fn from_rest(event: &RestEvent, bindings: Vec<(String, String)>) -> Result<Self, BodyError> {
        let mut map = Map::new();

        for (key, value) in &event.query {
            map.insert(key.clone(), value.to_value());
        }
        for (key, value) in &event.path_parameters {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        for (key, value) in bindings {
            map.insert(key, Value::String(value));
        }
        if let Some(body) = event.json_body()? {
            map.insert(BODY_KEY.to_string(), body);
        }

        Ok(Self(map))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns the argument as a string slice if it is a JSON string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// The parsed REST body, if one was sent.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.0.get(BODY_KEY)
    }

    /// Returns the argument or a `Missing` error. JSON `null` counts as missing.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::Missing`] if the key is absent or null.
    pub fn require(&self, name: &str) -> Result<&Value, ArgumentError> {
        match self.0.get(name) {
            Some(Value::Null) | None => Err(ArgumentError::Missing {
                name: name.to_string(),
            }),
            Some(value) => Ok(value),
        }
    }

    /// Returns a required argument rendered as a string.
    ///
    /// Numbers and booleans are accepted and rendered, since GraphQL and
    /// direct callers often send ids as numbers while REST always sends text.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::Missing`] when absent and
    /// [`ArgumentError::Invalid`] for arrays or objects.
    pub fn require_str(&self, name: &str) -> Result<String, ArgumentError> {
        match self.require(name)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(ArgumentError::Invalid {
                name: name.to_string(),
                reason: format!("expected a scalar, got {other}"),
            }),
        }
    }

    /// Deserializes a required argument into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::Missing`] when absent and
    /// [`ArgumentError::Invalid`] when the value does not fit `T`.
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentError> {
        let value = self.require(name)?.clone();
        serde_json::from_value(value).map_err(|e| ArgumentError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Names from `required` that are absent or null, in the given order.
    #[must_use]
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.require(name).is_err())
            .map(|name| (*name).to_string())
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
