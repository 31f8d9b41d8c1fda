//! Transactional sessions: credentials, connections, and the scoped
//! transaction primitive every handler runs inside.

pub mod config;
pub mod connection;
pub mod manager;
pub mod memory;
pub mod secrets;

#[cfg(feature = "aws")]
pub mod aws;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::fmt;

pub use config::SessionConfig;
pub use connection::{Connector, DataAccess, DatabaseConnection, DatabaseError, DbResult, Row};
pub use manager::{SessionManager, SessionState};
pub use memory::MemoryDatabase;
pub use secrets::{Credentials, EnvSecretStore, SecretStore, StaticSecretStore};

/// Transaction step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStage {
    Begin,
    Commit,
}

impl fmt::Display for TransactionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => f.write_str("begin"),
            Self::Commit => f.write_str("commit"),
        }
    }
}

/// Failures of the session layer itself, as opposed to a handler's own errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("secret '{key}' unavailable: {reason}")]
    SecretUnavailable { key: String, reason: String },
    #[error("database connection failed: {source}")]
    Connection {
        #[source]
        source: DatabaseError,
    },
    #[error("database connect timed out after {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },
    #[error("transaction {stage} failed: {source}")]
    Transaction {
        stage: TransactionStage,
        #[source]
        source: DatabaseError,
    },
}

impl SessionError {
    /// Whether the database (rather than the secret store) was unreachable.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::ConnectTimeout { .. })
    }
}
