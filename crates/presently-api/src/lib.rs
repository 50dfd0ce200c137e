//! Axum HTTP API server.
//!
//! This crate provides:
//! - Generation, progress polling and download endpoints
//! - Health and readiness probes
//! - Rate limiting and security headers
//! - Prometheus metrics
//! - The job reaper enforcing registry retention

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::JobReaper;
pub use state::AppState;
