//! Handler and dispatch error types, and their HTTP status mapping.

use http::StatusCode;
use roster_core::{ArgumentError, BodyError, ClassifyError};

use crate::session::{DatabaseError, SessionError};

/// Errors a handler (or the transaction around it) can produce.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error("{message}")]
    NotFound { message: String },
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// A domain error with a handler-chosen HTTP status.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Argument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Session(e) if e.is_connection_failure() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Session(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the message is safe to show a REST client as-is.
    #[must_use]
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self,
            Self::Argument(_) | Self::NotFound { .. } | Self::Status { .. }
        )
    }
}

/// Errors from routing an event or invoking its handler.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unroutable event: {0}")]
    Unroutable(#[from] ClassifyError),
    #[error("no route for {route}")]
    NotFound { route: String },
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<String>,
    },
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] BodyError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl DispatchError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unroutable(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Handler(e) => e.status_code(),
        }
    }
}
