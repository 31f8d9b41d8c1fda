//! Gateway status endpoints.
//!
//! `/health` reports the gateway phase, route table size, and whether the
//! session manager holds credentials and a warm connection.
//! `/health/ready` is `200` only while invocations are being admitted.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::network::Phase;
use crate::session::SessionState;

#[derive(Debug, Serialize)]
pub struct RouteCounts {
    pub rest: usize,
    pub graphql: usize,
    pub direct: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub phase: Phase,
    pub in_flight: u64,
    pub uptime_secs: u64,
    pub routes: RouteCounts,
    pub session: SessionState,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    let router = state.dispatcher.router();
    let manifest = router.manifest();
    Json(HealthReport {
        phase: state.lifecycle.phase(),
        in_flight: state.lifecycle.in_flight(),
        uptime_secs: state.started.elapsed().as_secs(),
        routes: RouteCounts {
            rest: manifest.rest.len(),
            graphql: manifest.graphql.len(),
            direct: manifest.direct.len(),
        },
        session: state.dispatcher.session().state().await,
    })
}

pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness_handler(State(state): State<AppState>) -> (StatusCode, Json<Phase>) {
    let phase = state.lifecycle.phase();
    let status = if phase == Phase::Serving {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(phase))
}
