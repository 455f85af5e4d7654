//! Generic error responder for everything the status route does not answer
//! itself: unmatched routes, handler panics, and errors that carry their own
//! HTTP status.
//!
//! Response shape: `{"message": <text>, "error": <detail>}`. The detail object
//! is only populated in [`DeploymentMode::Development`]; production always
//! sends `{}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::config::DeploymentMode;

/// Errors that fall through to the generic responder.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not Found")]
    NotFound,

    /// An error that declares its own status code.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("Internal Server Error")]
    Internal(String),
}

impl ApiError {
    /// Declared status, or 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Status { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Status { status, .. } => status.canonical_reason().unwrap_or("ERROR"),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn detail(&self) -> Value {
        let mut detail = Map::new();
        detail.insert("status".into(), json!(self.status_code().as_u16()));
        detail.insert("code".into(), json!(self.error_code()));
        if let Self::Internal(cause) = self {
            detail.insert("cause".into(), json!(cause));
        }
        Value::Object(detail)
    }
}

/// JSON error response body sent to clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: Value,
}

/// Converts [`ApiError`]s into responses according to the deployment mode.
#[derive(Debug, Clone, Copy)]
pub struct ErrorResponder {
    mode: DeploymentMode,
}

impl ErrorResponder {
    pub fn new(mode: DeploymentMode) -> Self {
        Self { mode }
    }

    pub fn body(&self, err: &ApiError) -> ErrorBody {
        ErrorBody {
            message: err.to_string(),
            error: if self.mode.exposes_error_detail() {
                err.detail()
            } else {
                Value::Object(Map::new())
            },
        }
    }

    pub fn respond(&self, err: &ApiError) -> Response {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?err, "Request failed");
        } else {
            tracing::debug!(error = %err, status = status.as_u16(), "Request rejected");
        }
        (status, axum::Json(self.body(err))).into_response()
    }
}
