//! `PostgreSQL` connections via `sqlx`.
//!
//! Row-returning statements are wrapped as
//! `WITH rows AS (<stmt>) SELECT COALESCE(json_agg(rows), '[]') FROM rows`
//! so any `SELECT` or `... RETURNING` yields JSON objects keyed by column
//! name without per-column decoding. Timestamps arrive as ISO-8601 strings.
//!
//! Lifecycle statements (`BEGIN`, `DISCARD ALL`, ...) go over the simple
//! query protocol. Parameterized queries are prepared and cached per
//! connection by `sqlx`; `reset` drops that cache together with the server
//! side statements so a warm connection can be reused.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::types::Json;
use sqlx::{ConnectOptions, Connection, Executor};

use super::config::SessionConfig;
use super::connection::{
    Connector, DataAccess, DatabaseConnection, DatabaseError, DbResult, Row,
};
use super::secrets::Credentials;

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        let code = match &e {
            sqlx::Error::Database(db) => db.code().map(|c| c.to_string()),
            _ => None,
        };
        let err = DatabaseError::from_source(e);
        match code {
            Some(code) => err.with_code(code),
            None => err,
        }
    }
}

/// Binds JSON parameters positionally onto a `sqlx` query or scalar query.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => query.bind(i),
                    None => query.bind(n.as_f64().unwrap_or_default()),
                },
                Value::String(s) => query.bind(s.clone()),
                other => query.bind(Json(other.clone())),
            };
        }
        query
    }};
}

fn statement_body(query: &str) -> &str {
    query.trim().trim_end_matches(';').trim_end()
}

// ---------------------------------------------------------------------------
// PgConnector
// ---------------------------------------------------------------------------

/// Opens `PostgreSQL` connections. Unset host/port/database fall back to the
/// standard `PG*` environment variables.
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    /// # Errors
    ///
    /// Returns [`DatabaseError`] if `ssl_mode` is not a recognised mode.
    pub fn from_config(config: &SessionConfig) -> DbResult<Self> {
        let mut options = PgConnectOptions::new().ssl_mode(PgSslMode::from_str(&config.ssl_mode)?);
        if let Some(host) = &config.host {
            options = options.host(host);
        }
        if let Some(port) = config.port {
            options = options.port(port);
        }
        if let Some(database) = &config.database {
            options = options.database(database);
        }
        Ok(Self { options })
    }

    /// Connector for a `postgres://` URL. Credentials in the URL are
    /// replaced by the ones passed to `connect`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] if the URL does not parse.
    pub fn from_url(url: &str) -> DbResult<Self> {
        Ok(Self {
            options: PgConnectOptions::from_str(url)?,
        })
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, credentials: &Credentials) -> DbResult<Box<dyn DatabaseConnection>> {
        let conn = self
            .options
            .clone()
            .username(&credentials.username)
            .password(&credentials.password)
            .connect()
            .await?;
        Ok(Box::new(PgSession { conn }))
    }
}

// ---------------------------------------------------------------------------
// PgSession
// ---------------------------------------------------------------------------

/// One live `PostgreSQL` connection.
#[derive(Debug)]
pub struct PgSession {
    conn: PgConnection,
}

impl PgSession {
    async fn run(&mut self, statement: &str) -> DbResult<()> {
        Executor::execute(&mut self.conn, statement).await?;
        Ok(())
    }
}

#[async_trait]
impl DataAccess for PgSession {
    async fn fetch_all(&mut self, query: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let wrapped = format!(
            "WITH rows AS ({}) SELECT COALESCE(json_agg(rows), '[]'::json) FROM rows",
            statement_body(query)
        );
        let rows: Json<Vec<Row>> =
            bind_params!(sqlx::query_scalar::<_, Json<Vec<Row>>>(&wrapped), params)
                .fetch_one(&mut self.conn)
                .await?;
        Ok(rows.0)
    }

    async fn execute(&mut self, query: &str, params: &[Value]) -> DbResult<u64> {
        let done = bind_params!(sqlx::query(statement_body(query)), params)
            .execute(&mut self.conn)
            .await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl DatabaseConnection for PgSession {
    async fn is_open(&mut self) -> bool {
        self.conn.ping().await.is_ok()
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.run("BEGIN").await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.run("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.run("ROLLBACK").await
    }

    async fn reset(&mut self) -> DbResult<()> {
        self.run("DISCARD ALL").await?;
        // DISCARD ALL deallocates server-side statements the client cache
        // still refers to.
        self.conn.clear_cached_statements().await?;
        Ok(())
    }

    fn data_access(&mut self) -> &mut dyn DataAccess {
        self
    }
}
