//! Catch-all handler that turns HTTP requests into REST events.

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use roster_core::event::parse_query_string;
use roster_core::{InboundEvent, RestEvent, RestResponse};
use tower::ServiceExt;
use tracing::warn;

use super::AppState;
use crate::service::DispatchResponse;

/// Dispatches any request that no other route claimed.
pub async fn gateway_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(_invocation) = state.lifecycle.admit() else {
        return into_http_response(RestResponse::error(503, "gateway is draining"));
    };
    let event = rest_event(&method, &uri, &headers, &body);

    let response = match state.pipeline.oneshot(InboundEvent::Rest(event)).await {
        Ok(DispatchResponse::Rest(response)) => response,
        Ok(DispatchResponse::Value(value)) => RestResponse::ok(&value),
        Err(e) => RestResponse::error(e.status_code().as_u16(), &e.to_string()),
    };
    into_http_response(response)
}

/// Builds the REST event an API gateway would have sent for this request.
///
/// Bodies that are not UTF-8 are passed base64-encoded.
#[must_use]
pub fn rest_event(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> RestEvent {
    let mut event = RestEvent::new(method.as_str(), uri.path());
    if let Some(query) = uri.query() {
        event.query = parse_query_string(query);
    }
    event.headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect::<BTreeMap<_, _>>();

    if !body.is_empty() {
        match std::str::from_utf8(body) {
            Ok(text) => event.body = Some(text.to_string()),
            Err(_) => {
                event.body = Some(base64::engine::general_purpose::STANDARD.encode(body));
                event.is_base64_encoded = true;
            }
        }
    }
    event
}

/// Converts a REST envelope into an HTTP response.
#[must_use]
pub fn into_http_response(envelope: RestResponse) -> Response {
    let status =
        StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = if envelope.is_base64_encoded {
        match base64::engine::general_purpose::STANDARD.decode(&envelope.body) {
            Ok(bytes) => Body::from(bytes),
            Err(e) => {
                warn!(error = %e, "response body is not valid base64");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    } else {
        Body::from(envelope.body)
    };

    let mut response = (status, body).into_response();
    for (name, value) in &envelope.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }
    response
}
