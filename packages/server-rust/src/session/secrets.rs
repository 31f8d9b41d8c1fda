//! Database credentials and the secret stores they are fetched from.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

use super::SessionError;

/// Database username and password.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parses a `{"username": ..., "password": ...}` secret document.
///
/// # Errors
///
/// Returns [`SessionError::SecretUnavailable`] when the text is not JSON or
/// lacks either field. There is no fallback credential.
pub fn parse_secret(key: &str, text: &str) -> Result<Credentials, SessionError> {
    serde_json::from_str(text).map_err(|e| SessionError::SecretUnavailable {
        key: key.to_string(),
        reason: format!("malformed secret: {e}"),
    })
}

/// External store holding database credentials.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetches the credentials stored under `key`.
    async fn get_secret(&self, key: &str) -> Result<Credentials, SessionError>;
}

// ---------------------------------------------------------------------------
// EnvSecretStore
// ---------------------------------------------------------------------------

/// Reads credentials from environment variables.
///
/// A JSON secret document in `json_var` takes precedence; otherwise both
/// `username_var` and `password_var` must be set.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    json_var: String,
    username_var: String,
    password_var: String,
}

impl EnvSecretStore {
    #[must_use]
    pub fn with_vars(json_var: &str, username_var: &str, password_var: &str) -> Self {
        Self {
            json_var: json_var.to_string(),
            username_var: username_var.to_string(),
            password_var: password_var.to_string(),
        }
    }
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::with_vars("ROSTER_DB_SECRET", "DB_USERNAME", "DB_PASSWORD")
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, key: &str) -> Result<Credentials, SessionError> {
        if let Ok(text) = std::env::var(&self.json_var) {
            return parse_secret(key, &text);
        }

        match (
            std::env::var(&self.username_var),
            std::env::var(&self.password_var),
        ) {
            (Ok(username), Ok(password)) => Ok(Credentials { username, password }),
            _ => Err(SessionError::SecretUnavailable {
                key: key.to_string(),
                reason: format!(
                    "neither {} nor {}/{} is set",
                    self.json_var, self.username_var, self.password_var
                ),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticSecretStore
// ---------------------------------------------------------------------------

/// Serves fixed credentials and counts fetches. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct StaticSecretStore {
    credentials: Option<Credentials>,
    fetches: AtomicUsize,
}

impl StaticSecretStore {
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            fetches: AtomicUsize::new(0),
        }
    }

    /// A store whose every fetch fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// How many times `get_secret` has been called.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, key: &str) -> Result<Credentials, SessionError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.credentials
            .clone()
            .ok_or_else(|| SessionError::SecretUnavailable {
                key: key.to_string(),
                reason: "secret store unreachable".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_secret_document() {
        let creds = parse_secret("k", r#"{"username":"app","password":"pw","host":"x"}"#).unwrap();
        assert_eq!(creds, Credentials::new("app", "pw"));
    }

    #[test]
    fn malformed_secret_is_unavailable() {
        let err = parse_secret("k", r#"{"username":"app"}"#).unwrap_err();
        assert!(matches!(err, SessionError::SecretUnavailable { key, .. } if key == "k"));
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("app", "hunter2"));
        assert!(rendered.contains("app"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn env_store_reads_split_variables() {
        std::env::set_var("ROSTER_TEST_SPLIT_USER", "app");
        std::env::set_var("ROSTER_TEST_SPLIT_PASS", "pw");
        let store = EnvSecretStore::with_vars(
            "ROSTER_TEST_SPLIT_JSON_UNSET",
            "ROSTER_TEST_SPLIT_USER",
            "ROSTER_TEST_SPLIT_PASS",
        );
        let creds = store.get_secret("db").await.unwrap();
        assert_eq!(creds, Credentials::new("app", "pw"));
    }

    #[tokio::test]
    async fn env_store_prefers_json_document() {
        std::env::set_var("ROSTER_TEST_JSON_DOC", r#"{"username":"json","password":"pw"}"#);
        std::env::set_var("ROSTER_TEST_JSON_USER", "split");
        let store = EnvSecretStore::with_vars(
            "ROSTER_TEST_JSON_DOC",
            "ROSTER_TEST_JSON_USER",
            "ROSTER_TEST_JSON_PASS_UNSET",
        );
        assert_eq!(store.get_secret("db").await.unwrap().username, "json");
    }

    #[tokio::test]
    async fn env_store_without_variables_is_unavailable() {
        let store = EnvSecretStore::with_vars("ROSTER_TEST_NONE_A", "ROSTER_TEST_NONE_B", "ROSTER_TEST_NONE_C");
        assert!(matches!(
            store.get_secret("db").await,
            Err(SessionError::SecretUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn static_store_counts_fetches() {
        let store = StaticSecretStore::new(Credentials::new("a", "b"));
        store.get_secret("db").await.unwrap();
        store.get_secret("db").await.unwrap();
        assert_eq!(store.fetch_count(), 2);

        let down = StaticSecretStore::unavailable();
        assert!(down.get_secret("db").await.is_err());
        assert_eq!(down.fetch_count(), 1);
    }
}
