//! API route handlers
//!
//! Routes are organized by functionality:
//!
//! - `health`: Health checks, readiness, and metrics
//! - `search`: Perceptual image search
//! - `admin`: Tag worklist and index introspection

pub mod admin;
pub mod health;
pub mod search;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info. This is the root endpoint (GET /) and
/// requires no authentication.
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "boorudex",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "endpoints": [
            "/api/v1/search",
            "/api/v1/admin/tags",
            "/api/v1/admin/tags/{tag}",
            "/api/v1/admin/tags/{tag}/queue_depth",
            "/api/v1/admin/characters/{name}/count",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
///
/// Returns a standardized error response for undefined routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
