//! Axum handlers for the local gateway and the state they share.

pub mod gateway;
pub mod health;

pub use gateway::gateway_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use super::GatewayLifecycle;
use crate::service::{build_invocation_pipeline, Dispatcher, InvocationPipeline};

/// State passed to every handler; cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: InvocationPipeline,
    /// The dispatcher behind `pipeline`, for health reporting.
    pub dispatcher: Dispatcher,
    pub lifecycle: Arc<GatewayLifecycle>,
    pub started: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, lifecycle: Arc<GatewayLifecycle>) -> Self {
        Self {
            pipeline: build_invocation_pipeline(dispatcher.clone()),
            dispatcher,
            lifecycle,
            started: Instant::now(),
        }
    }
}
