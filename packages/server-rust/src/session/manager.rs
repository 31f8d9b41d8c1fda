//! Transactional session manager.
//!
//! Owns one reusable database connection and the cached credentials used to
//! open it. [`SessionManager::with_transaction`] runs a closure inside a
//! transaction and guarantees cleanup on every exit path:
//!
//! 1. Credentials are fetched on first use and cached for the manager's life.
//! 2. The cached connection is reused while it reports itself open;
//!    otherwise a new one is opened under the configured connect timeout.
//! 3. `begin`, then the closure.
//! 4. `commit` on `Ok`; `rollback` on `Err`, returning the closure's error
//!    unchanged.
//! 5. `reset` regardless of outcome. Rollback or reset failures are logged
//!    and the connection is discarded so the next call reconnects.
//!
//! The connection sits behind an async mutex held for the whole scope, so
//! concurrent callers in one process are serialized. A scope that is
//! cancelled or panics leaves its slot marked dirty; the next caller
//! discards that connection instead of reusing it.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::connection::{Connector, DataAccess, DatabaseConnection};
use super::secrets::{Credentials, SecretStore};
use super::{SessionError, TransactionStage};

/// The cached connection and whether a scope is still using it.
struct Slot {
    conn: Box<dyn DatabaseConnection>,
    /// Set when a scope begins; cleared once reset succeeds.
    dirty: bool,
}

/// Observable state, for health reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub credentials_cached: bool,
    pub connection_cached: bool,
}

/// Scoped-transaction primitive over a single reusable connection.
pub struct SessionManager {
    config: SessionConfig,
    secrets: Arc<dyn SecretStore>,
    connector: Arc<dyn Connector>,
    credentials: OnceCell<Credentials>,
    slot: Mutex<Option<Slot>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        secrets: Arc<dyn SecretStore>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            config,
            secrets,
            connector,
            credentials: OnceCell::new(),
            slot: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the cached credential and connection state.
    pub async fn state(&self) -> SessionState {
        SessionState {
            credentials_cached: self.credentials.initialized(),
            connection_cached: self.slot.lock().await.is_some(),
        }
    }

    /// Drops the cached connection, waiting for any running scope to finish.
    /// Cached credentials are kept. Returns whether a connection was open.
    pub async fn release(&self) -> bool {
        let released = self.slot.lock().await.take().is_some();
        if released {
            info!("database connection released");
        }
        released
    }

    /// Runs `scope` inside a transaction on the shared connection.
    ///
    /// `name` labels the scope in logs. The closure receives the query-only
    /// view of the connection and must return a boxed future:
    ///
    /// ```ignore
    /// manager
    ///     .with_transaction("list_students", |db| {
    ///         Box::pin(async move { db.fetch_all(SQL, &[]).await.map_err(HandlerError::from) })
    ///     })
    ///     .await
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the closure's own error unchanged after a rollback. Session
    /// failures (credentials, connect, begin, commit) are converted into `E`
    /// through `From<SessionError>`.
    pub async fn with_transaction<T, E, F>(&self, name: &str, scope: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut dyn DataAccess) -> BoxFuture<'c, Result<T, E>> + Send,
        E: From<SessionError> + std::fmt::Display,
        T: Send,
    {
        let credentials = self.credentials().await.map_err(E::from)?;

        let mut guard = self.slot.lock().await;
        let slot = self.acquire(&mut guard, credentials).await.map_err(E::from)?;

        slot.dirty = true;
        let (outcome, mut healthy) = run_scope(slot.conn.as_mut(), name, scope).await;

        match slot.conn.reset().await {
            Ok(()) => {}
            Err(e) => {
                warn!(scope = name, error = %e, "connection reset failed; discarding connection");
                healthy = false;
            }
        }
        slot.dirty = !healthy;

        if !healthy {
            *guard = None;
        }
        outcome
    }

    /// Returns cached credentials, fetching them on first use.
    ///
    /// A failed fetch leaves the cache empty so a later call can retry.
    async fn credentials(&self) -> Result<&Credentials, SessionError> {
        self.credentials
            .get_or_try_init(|| async {
                info!(secret_id = %self.config.secret_id, "retrieving database credentials");
                let creds = self.secrets.get_secret(&self.config.secret_id).await?;
                debug!(username = %creds.username, "retrieved credentials");
                Ok(creds)
            })
            .await
    }

    /// Reuses the cached connection if it is clean and open, else opens one.
    async fn acquire<'s>(
        &self,
        slot: &'s mut Option<Slot>,
        credentials: &Credentials,
    ) -> Result<&'s mut Slot, SessionError> {
        let mut current = slot.take();
        let reusable = match current.as_mut() {
            Some(cached) if cached.dirty => {
                warn!("previous scope did not finish cleanly; discarding connection");
                false
            }
            Some(cached) => cached.conn.is_open().await,
            None => false,
        };

        let fresh = match current {
            Some(cached) if reusable => {
                debug!("reusing database connection");
                cached
            }
            stale => {
                if stale.is_some() {
                    info!("cached database connection is closed; reconnecting");
                }
                drop(stale);
                let conn = self.connect(credentials).await?;
                info!("new database connection created");
                Slot { conn, dirty: false }
            }
        };

        Ok(slot.insert(fresh))
    }

    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn DatabaseConnection>, SessionError> {
        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, self.connector.connect(credentials)).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(source)) => Err(SessionError::Connection { source }),
            Err(_elapsed) => Err(SessionError::ConnectTimeout {
                timeout_ms: crate::telemetry::duration_ms(timeout),
            }),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("credentials_cached", &self.credentials.initialized())
            .finish_non_exhaustive()
    }
}

/// Begin, run, then commit or roll back. Returns the outcome and whether the
/// connection is still fit for reuse.
async fn run_scope<T, E, F>(
    conn: &mut dyn DatabaseConnection,
    name: &str,
    scope: F,
) -> (Result<T, E>, bool)
where
    F: for<'c> FnOnce(&'c mut dyn DataAccess) -> BoxFuture<'c, Result<T, E>> + Send,
    E: From<SessionError> + std::fmt::Display,
{
    if let Err(source) = conn.begin().await {
        warn!(scope = name, error = %source, "begin failed");
        let err = SessionError::Transaction {
            stage: TransactionStage::Begin,
            source,
        };
        return (Err(E::from(err)), false);
    }

    match scope(conn.data_access()).await {
        Ok(value) => match conn.commit().await {
            Ok(()) => {
                debug!(scope = name, "transaction committed");
                (Ok(value), true)
            }
            Err(source) => {
                warn!(scope = name, error = %source, "commit failed; rolling back");
                let healthy = rollback(conn, name).await;
                let err = SessionError::Transaction {
                    stage: TransactionStage::Commit,
                    source,
                };
                (Err(E::from(err)), healthy)
            }
        },
        Err(err) => {
            debug!(scope = name, error = %err, "scope failed; rolling back");
            let healthy = rollback(conn, name).await;
            (Err(err), healthy)
        }
    }
}

async fn rollback(conn: &mut dyn DatabaseConnection, name: &str) -> bool {
    match conn.rollback().await {
        Ok(()) => true,
        Err(e) => {
            warn!(scope = name, error = %e, "rollback failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::session::connection::DbResult;
    use crate::session::memory::{FailPoint, MemoryDatabase};
    use crate::session::StaticSecretStore;

    /// Error type standing in for a handler's domain error.
    #[derive(Debug, PartialEq)]
    enum TestError {
        Domain(&'static str),
        Session(String),
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl From<SessionError> for TestError {
        fn from(e: SessionError) -> Self {
            Self::Session(e.to_string())
        }
    }

    fn manager(db: &MemoryDatabase, secrets: Arc<StaticSecretStore>) -> SessionManager {
        SessionManager::new(SessionConfig::default(), secrets, Arc::new(db.clone()))
    }

    fn secrets() -> Arc<StaticSecretStore> {
        Arc::new(StaticSecretStore::new(Credentials::new("app", "pw")))
    }

    async fn ok_scope(mgr: &SessionManager) -> Result<u64, TestError> {
        mgr.with_transaction("ok", |db| {
            Box::pin(async move {
                db.execute("UPDATE t SET x = 1", &[json!(1)])
                    .await
                    .map_err(|_| TestError::Domain("db"))
            })
        })
        .await
    }

    async fn failing_scope(mgr: &SessionManager) -> Result<u64, TestError> {
        mgr.with_transaction("fail", |_db| {
            Box::pin(async move { Err(TestError::Domain("boom")) })
        })
        .await
    }

    #[tokio::test]
    async fn success_commits_then_resets() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());

        assert_eq!(ok_scope(&mgr).await, Ok(1));
        assert_eq!(db.lifecycle(), vec!["connect", "begin", "commit", "reset"]);
    }

    #[tokio::test]
    async fn error_rolls_back_resets_and_propagates_unchanged() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());

        assert_eq!(failing_scope(&mgr).await, Err(TestError::Domain("boom")));
        assert_eq!(db.lifecycle(), vec!["connect", "begin", "rollback", "reset"]);
    }

    #[tokio::test]
    async fn sequential_scopes_reuse_connection() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());

        ok_scope(&mgr).await.unwrap();
        ok_scope(&mgr).await.unwrap();
        let _ = failing_scope(&mgr).await;
        ok_scope(&mgr).await.unwrap();

        assert_eq!(db.connect_count(), 1);
    }

    #[tokio::test]
    async fn credentials_fetched_once() {
        let db = MemoryDatabase::new();
        let store = secrets();
        let mgr = manager(&db, Arc::clone(&store));

        assert!(!mgr.state().await.credentials_cached);
        ok_scope(&mgr).await.unwrap();
        ok_scope(&mgr).await.unwrap();

        assert_eq!(store.fetch_count(), 1);
        assert_eq!(db.last_username().as_deref(), Some("app"));
        assert!(mgr.state().await.credentials_cached);
    }

    #[tokio::test]
    async fn closed_connection_is_replaced() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());

        ok_scope(&mgr).await.unwrap();
        db.close_connections();
        ok_scope(&mgr).await.unwrap();

        assert_eq!(db.connect_count(), 2);
    }

    #[tokio::test]
    async fn secret_failure_is_reported_and_retried_next_time() {
        let db = MemoryDatabase::new();
        let store = Arc::new(StaticSecretStore::unavailable());
        let mgr = manager(&db, Arc::clone(&store));

        let err = ok_scope(&mgr).await.unwrap_err();
        assert!(matches!(err, TestError::Session(msg) if msg.contains("unavailable")));
        let _ = ok_scope(&mgr).await;

        assert_eq!(store.fetch_count(), 2);
        assert_eq!(db.connect_count(), 0);
        assert!(db.log().is_empty());
    }

    #[tokio::test]
    async fn connect_failure_is_not_retried_within_call_but_next_call_reconnects() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());
        db.fail_once(FailPoint::Connect);

        let err = ok_scope(&mgr).await.unwrap_err();
        assert!(matches!(err, TestError::Session(msg) if msg.contains("connection")));
        assert_eq!(db.log(), vec!["connect"]);
        assert!(!mgr.state().await.connection_cached);

        ok_scope(&mgr).await.unwrap();
        assert_eq!(db.connect_count(), 1);
    }

    #[tokio::test]
    async fn release_drops_connection_but_keeps_credentials() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());
        assert!(!mgr.release().await);

        ok_scope(&mgr).await.unwrap();
        assert!(mgr.release().await);
        let state = mgr.state().await;
        assert!(state.credentials_cached);
        assert!(!state.connection_cached);

        ok_scope(&mgr).await.unwrap();
        assert_eq!(db.connect_count(), 2);
    }

    #[tokio::test]
    async fn reset_failure_keeps_outcome_and_discards_connection() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());
        db.fail_once(FailPoint::Reset);

        assert_eq!(ok_scope(&mgr).await, Ok(1));
        assert!(!mgr.state().await.connection_cached);

        ok_scope(&mgr).await.unwrap();
        assert_eq!(db.connect_count(), 2);
    }

    #[tokio::test]
    async fn rollback_failure_keeps_original_error() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());
        db.fail_once(FailPoint::Rollback);

        assert_eq!(failing_scope(&mgr).await, Err(TestError::Domain("boom")));
        assert_eq!(db.lifecycle(), vec!["connect", "begin", "rollback", "reset"]);
        assert!(!mgr.state().await.connection_cached);
    }

    #[tokio::test]
    async fn commit_failure_rolls_back_and_reports_session_error() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());
        db.fail_once(FailPoint::Commit);

        let err = ok_scope(&mgr).await.unwrap_err();
        assert!(matches!(err, TestError::Session(msg) if msg.contains("commit")));
        assert_eq!(db.lifecycle(), vec!["connect", "begin", "commit", "rollback", "reset"]);
    }

    #[tokio::test]
    async fn begin_failure_skips_scope_and_discards_connection() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());
        db.fail_once(FailPoint::Begin);

        let err = ok_scope(&mgr).await.unwrap_err();
        assert!(matches!(err, TestError::Session(msg) if msg.contains("begin")));
        assert!(db.queries().is_empty());
        assert_eq!(db.lifecycle(), vec!["connect", "begin", "reset"]);
        assert!(!mgr.state().await.connection_cached);
    }

    #[tokio::test]
    async fn cancelled_scope_leaves_connection_to_be_replaced() {
        let db = MemoryDatabase::new();
        let mgr = manager(&db, secrets());

        let slow = mgr.with_transaction("slow", |_db| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, TestError>(())
            })
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), slow).await.is_err());

        ok_scope(&mgr).await.unwrap();
        assert_eq!(db.connect_count(), 2);
    }

    /// Connector that never completes, to exercise the connect timeout.
    struct HangingConnector;

    #[async_trait]
    impl Connector for HangingConnector {
        async fn connect(&self, _c: &Credentials) -> DbResult<Box<dyn DatabaseConnection>> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_bounded_by_timeout() {
        let config = SessionConfig {
            connect_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let mgr = SessionManager::new(config, secrets(), Arc::new(HangingConnector));

        let err = mgr
            .with_transaction("t", |_db| Box::pin(async move { Ok::<_, TestError>(()) }))
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Session(msg) if msg.contains("50ms")));
    }
}
