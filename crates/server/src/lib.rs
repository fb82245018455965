//! HTTP query and control-plane surface for the perceptual image index.
//!
//! Gives the "query surface" and "control-plane operations" named in the
//! index design one concrete, testable transport: perceptual search over
//! indexed images, and administration of the Discoverer's tag worklist.
//!
//! # Features
//!
//! - **Authentication**: API key-based authentication with rate limiting
//! - **Middleware**: Compression, CORS, request ID tracking, structured logging
//! - **Graceful Shutdown**: ctrl_c/SIGTERM handling
//!
//! # API Endpoints
//!
//! ## Public Endpoints (No Authentication)
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - request counters and uptime (not a Prometheus exporter)
//!
//! ## Protected Endpoints (API Key Required)
//!
//! - `POST /api/v1/search` - Perceptual search by uploaded image
//! - `GET /api/v1/admin/tags` - List the Discoverer's tag worklist
//! - `POST /api/v1/admin/tags` - Add a tag to the worklist
//! - `DELETE /api/v1/admin/tags/{tag}` - Remove a tag from the worklist
//! - `GET /api/v1/admin/tags/{tag}/queue_depth` - Pending fetch queue depth
//! - `GET /api/v1/admin/characters/{name}/count` - Indexed images per character

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{start_server, start_server_with_state};
pub use state::ServerState;
