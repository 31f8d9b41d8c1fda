use std::time::Duration;

/// Secret id the credentials live under unless overridden.
pub const DEFAULT_SECRET_ID: &str = "simple-serverless/db-credentials";

/// Configuration for the transactional session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Key passed to the secret store to fetch credentials.
    pub secret_id: String,
    /// Upper bound on opening a new database connection.
    pub connect_timeout: Duration,
    /// libpq-style SSL mode (`disable`, `prefer`, `require`, ...).
    pub ssl_mode: String,
    /// Database host. `None` defers to `PGHOST`.
    pub host: Option<String>,
    /// Database port. `None` defers to `PGPORT`.
    pub port: Option<u16>,
    /// Database name. `None` defers to `PGDATABASE`.
    pub database: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret_id: DEFAULT_SECRET_ID.to_string(),
            connect_timeout: Duration::from_secs(5),
            ssl_mode: "prefer".to_string(),
            host: None,
            port: None,
            database: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.secret_id, "simple-serverless/db-credentials");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.ssl_mode, "prefer");
        assert!(config.host.is_none());
        assert!(config.port.is_none());
        assert!(config.database.is_none());
    }
}
