//! Roster command line: run the local gateway, invoke a single event, or
//! print the route table.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use roster_core::InboundEvent;
use roster_server::network::GatewayModule;
use roster_server::service::{build_invocation_pipeline, domain, Dispatcher};
use roster_server::session::{
    Connector, Credentials, MemoryDatabase, SecretStore, SessionManager, StaticSecretStore,
};
#[cfg(not(feature = "aws"))]
use roster_server::session::EnvSecretStore;
use roster_server::{telemetry, RuntimeConfig, SessionConfig};
use tokio::io::AsyncReadExt;
use tower::ServiceExt;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "roster", version)]
#[command(about = "Students, classes, and programs services")]
struct Cli {
    #[command(flatten)]
    runtime: RuntimeArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the routes over HTTP until interrupted.
    Serve {
        #[arg(long, env = "ROSTER_HOST", default_value = "127.0.0.1")]
        host: String,

        #[arg(long, env = "ROSTER_PORT", default_value_t = 3000)]
        port: u16,

        /// Seconds to wait for in-flight requests on shutdown.
        #[arg(long, env = "ROSTER_DRAIN_TIMEOUT_SECS", default_value_t = 30)]
        drain_timeout_secs: u64,
    },
    /// Dispatch one event read from a file (`-` for stdin) and print the result.
    Invoke {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
    /// Print every registered route as JSON.
    Routes,
}

#[derive(Args, Debug)]
struct RuntimeArgs {
    /// Key the database credentials are stored under.
    #[arg(long, global = true, env = "ROSTER_SECRET_ID", default_value = roster_server::session::config::DEFAULT_SECRET_ID)]
    secret_id: String,

    #[arg(long, global = true, env = "ROSTER_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    connect_timeout_secs: u64,

    #[arg(long, global = true, env = "ROSTER_DB_SSL_MODE", default_value = "prefer")]
    ssl_mode: String,

    /// Return underlying error text in 5xx responses.
    #[arg(long, global = true, env = "ROSTER_EXPOSE_INTERNAL_ERRORS")]
    expose_internal_errors: bool,

    #[arg(long, global = true, env = "ROSTER_LOG_JSON")]
    log_json: bool,

    /// Use an in-memory database and fixed credentials.
    #[arg(long, global = true)]
    dry_run: bool,
}

impl RuntimeArgs {
    fn runtime_config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig {
            session: SessionConfig {
                secret_id: self.secret_id.clone(),
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                ssl_mode: self.ssl_mode.clone(),
                ..SessionConfig::default()
            },
            log_json: self.log_json,
            ..RuntimeConfig::default()
        };
        config.dispatch.expose_internal_errors = self.expose_internal_errors;
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = cli.runtime.runtime_config();
    telemetry::init_tracing(config.log_json)?;

    match cli.command {
        Command::Routes => {
            let router = domain::default_router()?;
            println!("{}", serde_json::to_string_pretty(&router.manifest_json())?);
        }
        Command::Invoke { input } => {
            let dispatcher = build_dispatcher(&config, cli.runtime.dry_run).await?;
            let text = read_input(&input).await?;
            let raw: serde_json::Value =
                serde_json::from_str(&text).context("event is not valid JSON")?;
            let event = InboundEvent::classify(raw)?;

            let response = build_invocation_pipeline(dispatcher).oneshot(event).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&response.into_value())?
            );
        }
        Command::Serve {
            host,
            port,
            drain_timeout_secs,
        } => {
            config.gateway.host = host;
            config.gateway.port = port;
            config.gateway.drain_timeout = Duration::from_secs(drain_timeout_secs);

            let dispatcher = build_dispatcher(&config, cli.runtime.dry_run).await?;
            let mut gateway = GatewayModule::new(config.gateway.clone(), dispatcher);
            let addr = gateway.start().await?;
            info!(%addr, dry_run = cli.runtime.dry_run, "roster gateway listening");

            gateway
                .serve(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "cannot listen for ctrl-c, shutting down");
                    }
                })
                .await?;
        }
    }
    Ok(())
}

async fn build_dispatcher(config: &RuntimeConfig, dry_run: bool) -> anyhow::Result<Dispatcher> {
    let router = domain::default_router()?;
    let (secrets, connector): (Arc<dyn SecretStore>, Arc<dyn Connector>) = if dry_run {
        (
            Arc::new(StaticSecretStore::new(Credentials::new("dry-run", "dry-run"))),
            Arc::new(MemoryDatabase::new()),
        )
    } else {
        info!(source = SECRET_SOURCE, "database credentials source");
        (secret_store().await, database_connector(&config.session)?)
    };
    let session = SessionManager::new(config.session.clone(), secrets, connector);
    Ok(Dispatcher::new(Arc::new(router), Arc::new(session)).with_config(config.dispatch.clone()))
}

#[cfg(feature = "aws")]
const SECRET_SOURCE: &str = "secrets-manager";

#[cfg(not(feature = "aws"))]
const SECRET_SOURCE: &str = "environment";

#[cfg(feature = "aws")]
async fn secret_store() -> Arc<dyn SecretStore> {
    Arc::new(roster_server::session::aws::SecretsManagerStore::from_env().await)
}

#[cfg(not(feature = "aws"))]
async fn secret_store() -> Arc<dyn SecretStore> {
    Arc::new(EnvSecretStore::default())
}

#[cfg(feature = "postgres")]
fn database_connector(config: &SessionConfig) -> anyhow::Result<Arc<dyn Connector>> {
    let connector = roster_server::session::postgres::PgConnector::from_config(config)?;
    Ok(Arc::new(connector))
}

#[cfg(not(feature = "postgres"))]
fn database_connector(_config: &SessionConfig) -> anyhow::Result<Arc<dyn Connector>> {
    anyhow::bail!("built without the `postgres` feature; pass --dry-run")
}

async fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        Ok(text)
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn credentials_come_from_secrets_manager_when_aws_is_enabled() {
        let expected = if cfg!(feature = "aws") {
            "secrets-manager"
        } else {
            "environment"
        };
        assert_eq!(SECRET_SOURCE, expected);
    }

    #[tokio::test]
    async fn dry_run_dispatches_against_memory_database() {
        let config = RuntimeConfig::default();
        let dispatcher = build_dispatcher(&config, true).await.unwrap();

        let value = dispatcher
            .resolve_and_invoke(json!({"route": "list_students"}))
            .await
            .unwrap();

        assert_eq!(value, json!([]));
        assert!(dispatcher.session().state().await.credentials_cached);
    }
}
