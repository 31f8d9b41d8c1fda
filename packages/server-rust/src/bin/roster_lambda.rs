//! Lambda entry point.
//!
//! Logging, the route table, the Secrets Manager client, and the session
//! manager are built once per execution environment. Every invocation shares
//! them, so warm invocations reuse cached credentials and the open connection.

use std::sync::Arc;
use std::time::Duration;

use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use roster_core::InboundEvent;
use roster_server::service::{build_invocation_pipeline, domain, Dispatcher, InvocationPipeline};
use roster_server::session::aws::SecretsManagerStore;
use roster_server::session::postgres::PgConnector;
use roster_server::session::SessionManager;
use roster_server::{telemetry, RuntimeConfig};
use serde_json::Value;
use tower::ServiceExt;
use tracing::{info, Instrument};

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let config = runtime_config_from_env();
    telemetry::init_tracing(config.log_json)?;

    let router = domain::default_router()?;
    let secrets = SecretsManagerStore::from_env().await;
    let connector = PgConnector::from_config(&config.session)?;
    let session = SessionManager::new(config.session.clone(), Arc::new(secrets), Arc::new(connector));
    let dispatcher = Dispatcher::new(Arc::new(router), Arc::new(session))
        .with_config(config.dispatch.clone());
    info!(
        routes = dispatcher.router().len(),
        secret_id = %config.session.secret_id,
        "roster lambda initialised"
    );

    let pipeline = build_invocation_pipeline(dispatcher);
    run(service_fn(move |event: LambdaEvent<Value>| {
        let pipeline = pipeline.clone();
        async move { handle(pipeline, event).await }
    }))
    .await
}

async fn handle(pipeline: InvocationPipeline, event: LambdaEvent<Value>) -> Result<Value, LambdaError> {
    let span = tracing::info_span!("lambda", request_id = %event.context.request_id);
    async move {
        let event = InboundEvent::classify(event.payload)?;
        let response = pipeline.oneshot(event).await?;
        Ok(response.into_value())
    }
    .instrument(span)
    .await
}

fn runtime_config_from_env() -> RuntimeConfig {
    let mut config = RuntimeConfig {
        log_json: true,
        ..RuntimeConfig::default()
    };
    if let Ok(secret_id) = std::env::var("ROSTER_SECRET_ID") {
        config.session.secret_id = secret_id;
    }
    if let Some(secs) = std::env::var("ROSTER_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.session.connect_timeout = Duration::from_secs(secs);
    }
    if let Ok(ssl_mode) = std::env::var("ROSTER_DB_SSL_MODE") {
        config.session.ssl_mode = ssl_mode;
    }
    if let Ok(name) = std::env::var("AWS_LAMBDA_FUNCTION_NAME") {
        config.dispatch.service_name = name;
    }
    config.dispatch.expose_internal_errors = std::env::var("ROSTER_EXPOSE_INTERNAL_ERRORS")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);
    config
}
