//! Gateway errors and their HTTP rendering.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use glancer_supervisor::ClientError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by the chat endpoint.
///
/// Rendered as `{"error": <code>, "detail": <message>}`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inference server could not be reached at all.
    #[error("Could not connect to the inference server: {0}")]
    Unreachable(String),

    /// The request reached the provider, which answered with an error.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("{0} provider is not yet implemented.")]
    NotImplemented(&'static str),

    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),

    /// The request body was missing, not JSON, or lacked `prompt`.
    #[error("Invalid request: {detail}")]
    InvalidRequest { status: StatusCode, detail: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            GatewayError::UnsupportedProvider(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidRequest { status, .. } => *status,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Unreachable(_) => "INFERENCE_UNREACHABLE",
            GatewayError::Provider(_) => "PROVIDER_ERROR",
            GatewayError::NotImplemented(_) => "NOT_IMPLEMENTED",
            GatewayError::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            GatewayError::InvalidRequest { .. } => "INVALID_REQUEST",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ClientError> for GatewayError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unreachable(url) => GatewayError::Unreachable(url),
            ClientError::Http(e) if e.is_connect() => GatewayError::Unreachable(e.to_string()),
            ClientError::Api { status, message } => {
                GatewayError::Provider(format!("{} (HTTP {})", message, status))
            }
            ClientError::Remote(message) => GatewayError::Provider(message),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::InvalidRequest {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Chat request failed: {}", self);
        } else {
            warn!("Chat request rejected: {}", self);
        }

        let body = json!({
            "error": self.code(),
            "detail": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
