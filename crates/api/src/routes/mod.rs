//! HTTP routes
//!
//! Operational surface consumed by the booking frontend and by ops
//! tooling. Every route sits behind the rate limiter.

pub mod auth;
pub mod health;
pub mod notifications;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{middleware, Router};

use crate::context::AppContext;
use crate::middleware::rate_limit_middleware;

/// Build the complete router around a shared context.
pub fn api_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/auth/status", get(auth::status))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/cache", delete(auth::clear_cache))
        .route("/notifications/status", get(notifications::status))
        .route("/notifications/process", post(notifications::process))
        .layer(middleware::from_fn_with_state(Arc::clone(&ctx), rate_limit_middleware))
        .with_state(ctx)
}
