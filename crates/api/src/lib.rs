//! # CareGate API
//!
//! HTTP surface for the coordination service.
//!
//! This crate contains:
//! - Axum routes (health, token lifecycle, notification queue)
//! - Rate limiting middleware applied to every route
//! - Application context (dependency injection) and the binary entry point
//!
//! ## Architecture
//! - Depends on `common`, `domain`, and `infra`
//! - Wires the cache, token manager, and queue into one shared context
//! - Maps domain errors onto HTTP statuses at the edge

pub mod context;
pub mod error;
pub mod middleware;
pub mod routes;

// Re-export for convenience
pub use context::AppContext;
pub use error::{ApiError, ApiResult};
pub use routes::api_router;
