//! Event dispatch: classify, resolve, extract arguments, invoke inside a
//! transaction, and shape the response for the event's transport.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::{header, StatusCode};
use roster_core::{
    ArgumentError, Arguments, InboundEvent, RestEvent, RestResponse, RouteDescriptor, RouteKind,
};
use serde_json::Value;
use tower::Service;
use tracing::{debug, error, info};

use super::config::DispatchConfig;
use super::error::{DispatchError, HandlerError};
use super::handler::Handler;
use super::router::Router;
use crate::session::SessionManager;

/// One resolved call, built at dispatch entry and dropped once the response
/// is formatted.
pub struct Invocation {
    pub route: RouteDescriptor,
    pub handler: Arc<dyn Handler>,
    pub args: Arguments,
}

impl Invocation {
    #[must_use]
    pub fn kind(&self) -> RouteKind {
        self.route.kind()
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("route", &self.route.to_string())
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// A formatted dispatch result.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResponse {
    /// REST envelope, for success and error alike.
    Rest(RestResponse),
    /// The handler's raw value (GraphQL and direct events).
    Value(Value),
}

impl DispatchResponse {
    /// The HTTP status for REST responses.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rest(response) => Some(response.status_code),
            Self::Value(_) => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Rest(response) => response.into_value(),
            Self::Value(value) => value,
        }
    }
}

/// Routes inbound events to handlers and runs each inside a transaction.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    session: Arc<SessionManager>,
    config: DispatchConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn new(router: Arc<Router>, session: Arc<SessionManager>) -> Self {
        Self {
            router,
            session,
            config: DispatchConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatches a raw runtime event and returns the value to hand back.
    ///
    /// # Errors
    ///
    /// REST events never fail here: routing and handler errors become error
    /// envelopes. GraphQL and direct events return the error itself, and an
    /// event of no known shape yields [`DispatchError::Unroutable`].
    pub async fn resolve_and_invoke(&self, event: Value) -> Result<Value, DispatchError> {
        let event = InboundEvent::classify(event)?;
        Ok(self.dispatch(event).await?.into_value())
    }

    /// Dispatches a classified event.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::resolve_and_invoke`].
    pub async fn dispatch(&self, event: InboundEvent) -> Result<DispatchResponse, DispatchError> {
        if let InboundEvent::Rest(rest) = &event {
            return Ok(DispatchResponse::Rest(self.dispatch_rest(rest).await));
        }
        let invocation = self.prepare(&event)?;
        Ok(DispatchResponse::Value(self.invoke(invocation).await?))
    }

    /// Dispatches a REST event, mapping every failure to an error envelope.
    pub async fn dispatch_rest(&self, event: &RestEvent) -> RestResponse {
        let result = match self.prepare_rest(event) {
            Ok(invocation) => self.invoke(invocation).await.map_err(DispatchError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(value) => RestResponse::ok(&value),
            Err(e) => self.error_response(&e),
        }
    }

    /// Resolves the route and extracts arguments without invoking anything.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotFound`], [`DispatchError::MethodNotAllowed`], or
    /// [`DispatchError::InvalidBody`] for an undecodable REST body.
    pub fn prepare(&self, event: &InboundEvent) -> Result<Invocation, DispatchError> {
        match event {
            InboundEvent::Rest(rest) => self.prepare_rest(rest),
            InboundEvent::Graphql(gql) => {
                let resolved = self
                    .router
                    .resolve_graphql(&gql.parent_type_name, &gql.field_name)?;
                Ok(Invocation {
                    route: resolved.descriptor.clone(),
                    handler: resolved.handler,
                    args: Arguments::from(gql.arguments.clone()),
                })
            }
            InboundEvent::Direct(direct) => {
                let resolved = self.router.resolve_direct(&direct.route)?;
                Ok(Invocation {
                    route: resolved.descriptor.clone(),
                    handler: resolved.handler,
                    args: Arguments::from(direct.args.clone()),
                })
            }
        }
    }

    fn prepare_rest(&self, event: &RestEvent) -> Result<Invocation, DispatchError> {
        let found = self.router.resolve_rest(&event.method, &event.path)?;
        let args = Arguments::from_rest(event, found.bindings)?;
        Ok(Invocation {
            route: found.descriptor.clone(),
            handler: found.handler,
            args,
        })
    }

    /// Checks required arguments, then runs the handler in a transaction.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Argument`] before any connection is touched when a
    /// required key is missing; otherwise whatever the handler or the
    /// session manager returned.
    pub async fn invoke(&self, invocation: Invocation) -> Result<Value, HandlerError> {
        let Invocation {
            route,
            handler,
            args,
        } = invocation;

        if let Some(name) = args
            .missing(handler.required_arguments())
            .into_iter()
            .next()
        {
            return Err(ArgumentError::Missing { name }.into());
        }

        let name = route.to_string();
        debug!(route = %name, "invoking handler");
        self.session
            .with_transaction(&name, move |db| {
                Box::pin(async move { handler.call(db, args).await })
            })
            .await
    }

    fn error_response(&self, err: &DispatchError) -> RestResponse {
        let status = err.status_code();
        let client_facing = match err {
            DispatchError::Handler(e) => e.is_client_facing(),
            _ => true,
        };

        if status.is_server_error() {
            error!(error = %err, status = status.as_u16(), "request failed");
        } else {
            info!(error = %err, status = status.as_u16(), "request rejected");
        }

        let message = if client_facing || self.config.expose_internal_errors {
            err.to_string()
        } else {
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        };

        let response = RestResponse::error(status.as_u16(), &message);
        match err {
            DispatchError::MethodNotAllowed { allowed, .. } => {
                response.with_header(header::ALLOW.as_str(), allowed.join(", "))
            }
            _ => response,
        }
    }
}

impl Service<InboundEvent> for Dispatcher {
    type Response = DispatchResponse;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<DispatchResponse, DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: InboundEvent) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { dispatcher.dispatch(event).await })
    }
}

/// Status of a formatted response, for logs and metrics.
#[must_use]
pub fn outcome_status(result: &Result<DispatchResponse, DispatchError>) -> StatusCode {
    match result {
        Ok(response) => response
            .status_code()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK),
        Err(e) => e.status_code(),
    }
}
