//! Naming-convention mapper between database columns and wire payloads.
//!
//! Rows come out of the database with `snake_case` column names and go to
//! clients as `camelCase`. Only top-level keys of each object are renamed;
//! nested values pass through untouched.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static WORD_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(.)([A-Z][a-z]+)").expect("static regex"));
static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("([a-z0-9])([A-Z])").expect("static regex"));

/// `studentId` → `student_id`, `HTTPResponse` → `http_response`.
#[must_use]
pub fn to_snake(name: &str) -> String {
    let first = WORD_BOUNDARY.replace_all(name, "${1}_${2}");
    LOWER_UPPER.replace_all(&first, "${1}_${2}").to_lowercase()
}

/// `student_id` → `studentId`. Components after the first are title-cased.
#[must_use]
pub fn to_camel(name: &str) -> String {
    let mut parts = name.split('_');
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

/// Renames keys of an object, or of every object in an array, to camelCase.
#[must_use]
pub fn to_external_case(value: Value) -> Value {
    map_keys(value, to_camel)
}

/// Renames keys of an object, or of every object in an array, to snake_case.
#[must_use]
pub fn to_internal_case(value: Value) -> Value {
    map_keys(value, to_snake)
}

fn map_keys(value: Value, rename: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(rename_object(map, rename)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Value::Object(rename_object(map, rename)),
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}

fn rename_object(map: Map<String, Value>, rename: fn(&str) -> String) -> Map<String, Value> {
    map.into_iter().map(|(k, v)| (rename(&k), v)).collect()
}
