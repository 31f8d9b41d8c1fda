//! AWS Secrets Manager credential store.

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;
use tracing::debug;

use super::secrets::{parse_secret, Credentials, SecretStore};
use super::SessionError;

/// Reads `{"username", "password"}` secrets from AWS Secrets Manager.
///
/// Text secrets (`SecretString`) and binary secrets (`SecretBinary` holding
/// the same JSON document) are both accepted.
#[derive(Debug, Clone)]
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the ambient AWS configuration (env, profile, or
    /// the Lambda execution role).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret(&self, key: &str) -> Result<Credentials, SessionError> {
        let unavailable = |reason: String| SessionError::SecretUnavailable {
            key: key.to_string(),
            reason,
        };

        let output = self
            .client
            .get_secret_value()
            .secret_id(key)
            .send()
            .await
            .map_err(|e| unavailable(aws_sdk_secretsmanager::error::DisplayErrorContext(e).to_string()))?;
        debug!(secret_id = key, "retrieved secret value");

        if let Some(text) = output.secret_string() {
            return parse_secret(key, text);
        }
        if let Some(blob) = output.secret_binary() {
            let text = std::str::from_utf8(blob.as_ref())
                .map_err(|e| unavailable(format!("binary secret is not UTF-8: {e}")))?;
            return parse_secret(key, text);
        }
        Err(unavailable("secret has neither a string nor a binary value".to_string()))
    }
}
