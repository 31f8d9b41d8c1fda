//! Domain handlers for the roster services.
//!
//! Each submodule owns its SQL and exposes a `register` function that binds
//! its handlers to REST, GraphQL, and direct routes.

pub mod classes;
pub mod programs;
pub mod students;

use roster_core::case::to_external_case;
use roster_core::PatternError;
use serde_json::Value;

use crate::service::router::Router;
use crate::session::Row;

/// Registers every domain's routes.
///
/// # Errors
///
/// Returns [`PatternError`] if a route template is malformed.
pub fn register_all(router: &mut Router) -> Result<(), PatternError> {
    students::register(router)?;
    classes::register(router)?;
    programs::register(router)?;
    Ok(())
}

/// Builds a router with every domain registered.
///
/// # Errors
///
/// Returns [`PatternError`] if a route template is malformed.
pub fn default_router() -> Result<Router, PatternError> {
    let mut router = Router::new();
    register_all(&mut router)?;
    Ok(router)
}

pub(crate) fn external_row(row: Row) -> Value {
    to_external_case(Value::Object(row))
}

pub(crate) fn external_rows(rows: Vec<Row>) -> Value {
    Value::Array(rows.into_iter().map(external_row).collect())
}
