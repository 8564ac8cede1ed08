//! Axum HTTP API server.
//!
//! This crate provides:
//! - Multipart upload that starts a transcoding job
//! - Server-Sent Events stream of job status updates
//! - Job cancellation
//! - Health and Prometheus metrics endpoints

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
