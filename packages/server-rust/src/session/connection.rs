//! Database connection seams.
//!
//! Two traits split what handlers may do from what only the session manager
//! may do:
//!
//! - [`DataAccess`]: run a query and get rows back. This is all a handler
//!   ever sees.
//! - [`DatabaseConnection`]: a live connection with transaction lifecycle
//!   control (`begin`/`commit`/`rollback`/`reset`) and liveness checks.
//!
//! Rows are JSON objects keyed by column name; SQL text is opaque here.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::secrets::Credentials;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

pub type DbResult<T> = Result<T, DatabaseError>;

/// Failure reported by the data-access layer.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DatabaseError {
    message: String,
    /// Vendor error code (e.g. a PostgreSQL SQLSTATE) when one is known.
    code: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DatabaseError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn from_source(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: source.to_string(),
            code: None,
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Query execution, as exposed to handlers.
#[async_trait]
pub trait DataAccess: Send {
    /// Runs a row-returning statement and collects every row.
    async fn fetch_all(&mut self, query: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    /// Runs a row-returning statement and returns the first row, if any.
    async fn fetch_optional(&mut self, query: &str, params: &[Value]) -> DbResult<Option<Row>> {
        Ok(self.fetch_all(query, params).await?.into_iter().next())
    }

    /// Runs a statement for its effect and returns the affected row count.
    async fn execute(&mut self, query: &str, params: &[Value]) -> DbResult<u64>;
}

/// A live connection under session-manager control.
#[async_trait]
pub trait DatabaseConnection: DataAccess {
    /// Reports whether the connection can still be used.
    async fn is_open(&mut self) -> bool;

    async fn begin(&mut self) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;

    /// Clears session-level state (temporary settings, prepared plans) so the
    /// connection is safe to hand to the next invocation.
    async fn reset(&mut self) -> DbResult<()>;

    /// The query-only view handed to handlers.
    fn data_access(&mut self) -> &mut dyn DataAccess;
}

/// Opens new connections from credentials.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> DbResult<Box<dyn DatabaseConnection>>;
}
