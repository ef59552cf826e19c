//! Axum HTTP API server.
//!
//! This crate provides:
//! - Analyze endpoints for client-sampled frames and raw video uploads
//! - Cached analysis lookup and the result JSON Schema
//! - Rate limiting, security headers and request IDs
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
