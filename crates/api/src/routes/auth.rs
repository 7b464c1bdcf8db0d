//! Token lifecycle endpoints
//!
//! Status and control for the cached provider credential. None of these
//! handlers ever return token bytes; callers that need the token itself go
//! through the internal manager, not HTTP.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use caregate_infra::provider::TokenStatus;

use crate::context::AppContext;
use crate::error::ApiResult;

/// Current token state: presence, expiry, and remaining cache lifetime.
pub async fn status(State(ctx): State<Arc<AppContext>>) -> Json<TokenStatus> {
    Json(ctx.tokens.token_status().await)
}

/// Force a refresh now instead of waiting for expiry.
///
/// Responds with the post-refresh status so callers can confirm the new
/// expiry without ever seeing the credential.
pub async fn refresh(State(ctx): State<Arc<AppContext>>) -> ApiResult<Json<TokenStatus>> {
    ctx.tokens.refresh_access_token().await?;
    Ok(Json(ctx.tokens.token_status().await))
}

/// Drop the cached token so the next caller performs a fresh grant.
pub async fn clear_cache(State(ctx): State<Arc<AppContext>>) -> ApiResult<StatusCode> {
    ctx.tokens.clear_token_cache().await?;
    Ok(StatusCode::NO_CONTENT)
}
