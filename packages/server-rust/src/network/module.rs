//! Local gateway with a deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the listener, and
//! `serve()` accepts requests until the shutdown future resolves. Binding
//! separately lets callers learn the OS-assigned port before serving.
//!
//! Once shutdown is requested the gateway answers `503` to new requests,
//! waits for dispatched ones, and then releases the warm database
//! connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::GatewayConfig;
use super::handlers::{
    gateway_handler, health_handler, liveness_handler, readiness_handler, AppState,
};
use super::middleware::with_http_layers;
use super::lifecycle::GatewayLifecycle;
use crate::service::Dispatcher;

/// Serves a [`Dispatcher`] over HTTP.
///
/// Health routes live under `/health`; every other request becomes a REST
/// event and goes through the invocation pipeline.
pub struct GatewayModule {
    config: GatewayConfig,
    dispatcher: Dispatcher,
    listener: Option<TcpListener>,
    lifecycle: Arc<GatewayLifecycle>,
}

impl GatewayModule {
    #[must_use]
    pub fn new(config: GatewayConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher,
            listener: None,
            lifecycle: Arc::new(GatewayLifecycle::new()),
        }
    }

    #[must_use]
    pub fn lifecycle(&self) -> Arc<GatewayLifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Health routes, the catch-all dispatcher route, and HTTP middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState::new(self.dispatcher.clone(), Arc::clone(&self.lifecycle));
        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .fallback(gateway_handler);
        with_http_layers(router, &self.config).with_state(state)
    }

    /// Binds the listener and returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "gateway listener bound");
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests for
    /// up to `drain_timeout` and releases the session's connection.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = self.build_router();
        let lifecycle = Arc::clone(&self.lifecycle);

        let signal = {
            let lifecycle = Arc::clone(&lifecycle);
            async move {
                shutdown.await;
                info!("shutdown requested, draining gateway");
                lifecycle.stop_admitting();
            }
        };

        lifecycle.serving();
        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        if lifecycle.drain(self.config.drain_timeout).await {
            info!("gateway drained");
        } else {
            warn!(
                in_flight = lifecycle.in_flight(),
                "drain timeout expired with requests outstanding"
            );
        }
        self.dispatcher.session().release().await;
        Ok(())
    }
}
