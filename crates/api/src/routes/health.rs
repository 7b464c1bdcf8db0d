//! Liveness endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_backend: &'static str,
}

/// Reports process liveness and which cache backend the service settled on.
pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cache_backend: ctx.backend.as_str(),
    })
}
