//! Notification queue endpoints
//!
//! Inspection plus a manual sweep trigger. The background worker runs the
//! same sweep on its own schedule; the POST exists for ops to drain a
//! backlog without waiting out the interval.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use caregate_infra::notify::{ProcessReport, QueueStatus};

use crate::context::AppContext;
use crate::error::ApiResult;

/// Pending and failed items currently sitting in the queue.
pub async fn status(State(ctx): State<Arc<AppContext>>) -> ApiResult<Json<QueueStatus>> {
    Ok(Json(ctx.queue.queue_status().await?))
}

/// Run one sweep immediately and report what it did.
pub async fn process(State(ctx): State<Arc<AppContext>>) -> ApiResult<Json<ProcessReport>> {
    Ok(Json(ctx.queue.process_queue().await?))
}
