//! Shared setup for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use roster_server::service::{domain, Dispatcher};
use roster_server::session::{
    Credentials, MemoryDatabase, Row, SessionConfig, SessionManager, StaticSecretStore,
};
use serde_json::Value;

/// A dispatcher over the full domain router, backed by `db`.
pub fn dispatcher(db: &MemoryDatabase) -> Dispatcher {
    let session = SessionManager::new(
        SessionConfig::default(),
        Arc::new(StaticSecretStore::new(Credentials::new("app", "pw"))),
        Arc::new(db.clone()),
    );
    let router = domain::default_router().expect("domain routes are valid");
    Dispatcher::new(Arc::new(router), Arc::new(session))
}

/// Loads `tests/fixtures/<name>`.
pub fn fixture(name: &str) -> Value {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("reading {}: {e}", path.display()));
    serde_json::from_str(&text).expect("fixture is valid JSON")
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Decodes the JSON body of a REST envelope returned by the dispatcher.
pub fn envelope_body(envelope: &Value) -> Value {
    let body = envelope["body"].as_str().expect("envelope body is a string");
    serde_json::from_str(body).expect("envelope body is JSON")
}
