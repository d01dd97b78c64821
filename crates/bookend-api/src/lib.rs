//! Read-only HTTP API over the QA results store.
//!
//! This crate provides:
//! - Run, sample, narrative and baseline browsing
//! - A/B comparison of two stored runs
//! - Request id, logging and security header middleware
//! - Prometheus metrics

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
