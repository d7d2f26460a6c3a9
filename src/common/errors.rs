//! Error taxonomy for the serving core and the remote client core.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Server-side request and lifecycle errors.
///
/// Per-request variants map onto HTTP status codes in `IntoResponse`;
/// a failing request never takes the server process down with it.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("range not satisfiable: {0}")]
    RangeNotSatisfiable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PortInUse(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal errors get logged in full but reported opaquely
        let message = match &self {
            AppError::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Client-core errors when talking to a remote peer.
///
/// Returned as values, never panics: callers must be able to tell a
/// network fault from a rejected password from a non-VitShare endpoint.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("could not connect to remote peer: {0}")]
    ConnectFailed(String),

    #[error("remote peer rejected the password")]
    AuthRejected,

    #[error("remote endpoint does not speak the VitShare protocol: {0}")]
    ProtocolMismatch(String),

    #[error("transfer failed: {0}")]
    Io(String),
}
