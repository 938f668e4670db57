use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the manifest rewriting core and the HTTP layer.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Origin unreachable, timed out, or answered with a non-2xx status.
    #[error("Failed to fetch manifest from origin: {0}")]
    FetchError(#[from] reqwest::Error),

    /// Input that prevents a deterministic rewrite.
    #[error("Failed to rewrite manifest: {0}")]
    TransformError(String),

    /// Missing, empty or malformed caller input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// HTTP status the surrounding service answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::FetchError(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::FetchError(_) => StatusCode::BAD_GATEWAY,
            ProxyError::TransformError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ProxyError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ProxyError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        // Bad requests echo the message; upstream details stay in the logs.
        let body = match &self {
            ProxyError::InvalidArgument(msg) => msg.clone(),
            _ => status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_maps_to_bad_request() {
        let err = ProxyError::InvalidArgument("playbackUrl is empty".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid argument: playbackUrl is empty");
    }

    #[test]
    fn transform_error_maps_to_unprocessable() {
        let err = ProxyError::TransformError("no .ism".to_string());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn internal_error_maps_to_500() {
        let err = ProxyError::InternalError("client".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
