//! In-memory database double.
//!
//! [`MemoryDatabase`] is a [`Connector`] whose connections record every call
//! into a shared log and answer queries from a script of canned results.
//! Failures can be injected at each lifecycle step. It backs the unit and
//! integration tests and the CLI's `--dry-run` mode.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::connection::{
    Connector, DataAccess, DatabaseConnection, DatabaseError, DbResult, Row,
};
use super::secrets::Credentials;

/// Lifecycle step at which a failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Connect,
    Begin,
    Commit,
    Rollback,
    Reset,
}

#[derive(Debug, Default)]
struct MemoryState {
    log: Vec<String>,
    queries: Vec<(String, Vec<Value>)>,
    connects: u64,
    /// Connections with a generation below this report themselves closed.
    closed_below: u64,
    failures: Vec<FailPoint>,
    results: VecDeque<DbResult<Vec<Row>>>,
    affected: VecDeque<DbResult<u64>>,
    last_username: Option<String>,
}

impl MemoryState {
    fn take_failure(&mut self, point: FailPoint) -> bool {
        if let Some(pos) = self.failures.iter().position(|p| *p == point) {
            self.failures.remove(pos);
            true
        } else {
            false
        }
    }
}

/// Shared handle to the in-memory database; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, in order (`connect`, `begin`, `fetch_all ...`).
    #[must_use]
    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    /// Lifecycle calls only, with queries filtered out.
    #[must_use]
    pub fn lifecycle(&self) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|entry| !entry.contains(' '))
            .cloned()
            .collect()
    }

    /// Statements and their parameters, in execution order.
    #[must_use]
    pub fn queries(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().queries.clone()
    }

    #[must_use]
    pub fn connect_count(&self) -> u64 {
        self.state.lock().connects
    }

    /// Username of the most recent successful connect.
    #[must_use]
    pub fn last_username(&self) -> Option<String> {
        self.state.lock().last_username.clone()
    }

    /// Makes every connection opened so far report itself closed.
    pub fn close_connections(&self) {
        let mut state = self.state.lock();
        state.closed_below = state.connects + 1;
    }

    /// Fails the next call at `point` once.
    pub fn fail_once(&self, point: FailPoint) {
        self.state.lock().failures.push(point);
    }

    /// Queues the rows returned by the next `fetch_*` call.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state.lock().results.push_back(Ok(rows));
    }

    /// Queues a failure for the next `fetch_*` call.
    pub fn push_query_error(&self, message: &str) {
        self.state
            .lock()
            .results
            .push_back(Err(DatabaseError::new(message)));
    }

    /// Queues the affected-row count for the next `execute` call.
    pub fn push_affected(&self, count: u64) {
        self.state.lock().affected.push_back(Ok(count));
    }

    fn record(&self, entry: String) {
        self.state.lock().log.push(entry);
    }
}

#[async_trait]
impl Connector for MemoryDatabase {
    async fn connect(&self, credentials: &Credentials) -> DbResult<Box<dyn DatabaseConnection>> {
        let mut state = self.state.lock();
        state.log.push("connect".to_string());
        if state.take_failure(FailPoint::Connect) {
            return Err(DatabaseError::new("connection refused"));
        }
        state.connects += 1;
        state.last_username = Some(credentials.username.clone());
        Ok(Box::new(MemoryConnection {
            db: self.clone(),
            generation: state.connects,
        }))
    }
}

/// One connection handed out by [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    db: MemoryDatabase,
    generation: u64,
}

impl MemoryConnection {
    fn step(&self, point: FailPoint, name: &str) -> DbResult<()> {
        let mut state = self.db.state.lock();
        state.log.push(name.to_string());
        if state.take_failure(point) {
            Err(DatabaseError::new(format!("{name} failed")))
        } else {
            Ok(())
        }
    }

    fn query(&self, op: &str, query: &str, params: &[Value]) {
        let mut state = self.db.state.lock();
        state
            .log
            .push(format!("{op} {}", Value::Array(params.to_vec())));
        state.queries.push((query.to_string(), params.to_vec()));
    }
}

#[async_trait]
impl DataAccess for MemoryConnection {
    async fn fetch_all(&mut self, query: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.query("fetch_all", query, params);
        self.db
            .state
            .lock()
            .results
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn execute(&mut self, query: &str, params: &[Value]) -> DbResult<u64> {
        self.query("execute", query, params);
        self.db
            .state
            .lock()
            .affected
            .pop_front()
            .unwrap_or(Ok(1))
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn is_open(&mut self) -> bool {
        self.generation >= self.db.state.lock().closed_below
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.step(FailPoint::Begin, "begin")
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.step(FailPoint::Commit, "commit")
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.step(FailPoint::Rollback, "rollback")
    }

    async fn reset(&mut self) -> DbResult<()> {
        self.step(FailPoint::Reset, "reset")
    }

    fn data_access(&mut self) -> &mut dyn DataAccess {
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn creds() -> Credentials {
        Credentials::new("app", "pw")
    }

    #[tokio::test]
    async fn records_calls_and_serves_scripted_rows() {
        let db = MemoryDatabase::new();
        let row = json!({"student_id": 1}).as_object().unwrap().clone();
        db.push_rows(vec![row.clone()]);

        let mut conn = db.connect(&creds()).await.unwrap();
        conn.begin().await.unwrap();
        let rows = conn
            .data_access()
            .fetch_all("SELECT 1", &[json!("x")])
            .await
            .unwrap();
        conn.commit().await.unwrap();

        assert_eq!(rows, vec![row]);
        assert_eq!(db.log(), vec!["connect", "begin", "fetch_all [\"x\"]", "commit"]);
        assert_eq!(db.lifecycle(), vec!["connect", "begin", "commit"]);
        assert_eq!(db.queries()[0].0, "SELECT 1");
        assert_eq!(db.last_username().as_deref(), Some("app"));
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let db = MemoryDatabase::new();
        db.fail_once(FailPoint::Connect);
        assert!(db.connect(&creds()).await.is_err());

        let mut conn = db.connect(&creds()).await.unwrap();
        db.fail_once(FailPoint::Reset);
        assert!(conn.reset().await.is_err());
        assert!(conn.reset().await.is_ok());
        assert_eq!(db.connect_count(), 1);
    }

    #[tokio::test]
    async fn close_connections_marks_existing_closed_only() {
        let db = MemoryDatabase::new();
        let mut first = db.connect(&creds()).await.unwrap();
        assert!(first.is_open().await);

        db.close_connections();
        assert!(!first.is_open().await);

        let mut second = db.connect(&creds()).await.unwrap();
        assert!(second.is_open().await);
    }

    #[tokio::test]
    async fn fetch_optional_returns_first_row() {
        let db = MemoryDatabase::new();
        db.push_rows(vec![
            json!({"a": 1}).as_object().unwrap().clone(),
            json!({"a": 2}).as_object().unwrap().clone(),
        ]);
        let mut conn = db.connect(&creds()).await.unwrap();
        let row = conn.data_access().fetch_optional("q", &[]).await.unwrap();
        assert_eq!(row.unwrap()["a"], 1);
        assert!(conn.data_access().fetch_optional("q", &[]).await.unwrap().is_none());
    }
}
