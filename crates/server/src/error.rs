use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced across the HTTP boundary, translated from each domain
/// crate's own error type into one response shape.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: max {0}MB allowed")]
    PayloadTooLarge(usize),

    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] fingerprint::FingerprintError),

    #[error("upstream error: {0}")]
    Upstream(#[from] upstream::UpstreamError),

    #[error("not found")]
    NotFound,

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// API error response structure, uniform across every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Fingerprint(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Store(_) | ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) | ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServerError::Authentication(_) => "AUTH_FAILED",
            ServerError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ServerError::Store(_) => "STORE_ERROR",
            ServerError::Fingerprint(_) => "FINGERPRINT_ERROR",
            ServerError::Upstream(_) => "UPSTREAM_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(err: std::net::AddrParseError) -> Self {
        ServerError::Config(format!("invalid address: {err}"))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("io error: {err}"))
    }
}
