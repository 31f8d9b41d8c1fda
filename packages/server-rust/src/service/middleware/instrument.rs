//! Invocation instrumentation.
//!
//! Opens a span per event and records duration and outcome, both as a log
//! line and through the `metrics` facade. The library installs no exporter;
//! without one the metric calls are no-ops.

use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use roster_core::InboundEvent;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::dispatch::{outcome_status, DispatchResponse};
use crate::service::error::DispatchError;
use crate::telemetry::duration_ms;

pub const INVOCATIONS_TOTAL: &str = "roster_invocations_total";
pub const INVOCATION_DURATION_SECONDS: &str = "roster_invocation_duration_seconds";

/// Short description of an event for span fields, before routing.
#[must_use]
pub fn event_label(event: &InboundEvent) -> String {
    match event {
        InboundEvent::Rest(rest) => format!("{} {}", rest.method, rest.path),
        InboundEvent::Graphql(gql) => format!("{}.{}", gql.parent_type_name, gql.field_name),
        InboundEvent::Direct(direct) => format!("direct:{}", direct.route),
    }
}

// ---------------------------------------------------------------------------
// InstrumentLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InstrumentLayer {
    service_name: String,
}

impl InstrumentLayer {
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl<S> Layer<S> for InstrumentLayer {
    type Service = InstrumentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InstrumentService {
            inner,
            service_name: self.service_name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// InstrumentService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InstrumentService<S> {
    inner: S,
    service_name: String,
}

impl<S> Service<InboundEvent> for InstrumentService<S>
where
    S: Service<InboundEvent, Response = DispatchResponse, Error = DispatchError> + Send,
    S::Future: Send + 'static,
{
    type Response = DispatchResponse;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<DispatchResponse, DispatchError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, event: InboundEvent) -> Self::Future {
        let kind = event.kind().as_str();
        let label = event_label(&event);
        let service = self.service_name.clone();

        let span = info_span!(
            "invocation",
            service = %service,
            kind = kind,
            event = %label,
            status = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        let fut = self.inner.call(event);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let status = outcome_status(&result);
                let outcome = if status.is_server_error() {
                    "error"
                } else if status.is_client_error() {
                    "rejected"
                } else {
                    "ok"
                };

                let duration_ms = duration_ms(elapsed);
                let span = tracing::Span::current();
                span.record("status", status.as_u16());
                span.record("duration_ms", duration_ms);

                metrics::counter!(
                    INVOCATIONS_TOTAL,
                    "service" => service.clone(),
                    "kind" => kind,
                    "outcome" => outcome
                )
                .increment(1);
                metrics::histogram!(
                    INVOCATION_DURATION_SECONDS,
                    "service" => service,
                    "kind" => kind
                )
                .record(elapsed.as_secs_f64());

                tracing::info!(
                    kind = kind,
                    status = status.as_u16(),
                    duration_ms = duration_ms,
                    outcome = outcome,
                    "invocation complete"
                );

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
