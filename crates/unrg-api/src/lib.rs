//! Axum HTTP API server for unregistry.
//!
//! This crate provides:
//! - Bearer token gate over the `/api` tree
//! - Upload, download, list and delete for files and images
//! - Liveness/readiness probes and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use auth::{AuthRejection, TokenVerifier};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
