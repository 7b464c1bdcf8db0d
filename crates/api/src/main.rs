//! CareGate service entry point
//!
//! Bootstraps configuration, picks the cache backend, wires the shared
//! context, and runs the Axum HTTP server alongside the background
//! queue worker until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use caregate_api::{api_router, AppContext};
use caregate_domain::{CareGateError, Result};
use caregate_infra::cache::connect_cache;
use caregate_infra::config;
use caregate_infra::notify::QueueWorker;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file, then logging before
    // anything that might want to report a startup problem.
    dotenvy::dotenv().ok();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("caregate=info,info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = config::load()?;

    // Backend selection happens exactly once, here. Everything downstream
    // sees only the trait object.
    let connected = connect_cache(&settings.cache).await;
    let store = connected.store;
    let backend = connected.backend;
    let mut sweeper = connected.sweeper;
    if let Some(runtime) = sweeper.as_mut() {
        runtime.start().await?;
    }

    let ctx = Arc::new(AppContext::build(&settings, Arc::clone(&store), backend)?);

    let mut worker = QueueWorker::new(Arc::clone(&ctx.queue), settings.queue.sweep_interval_secs);
    worker.start().await?;

    let app = api_router(Arc::clone(&ctx));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CareGateError::Internal(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, backend = backend.as_str(), "CareGate API listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    tokio::select! {
        result = server => {
            result.map_err(|e| CareGateError::Internal(format!("server error: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    worker.stop().await?;
    if let Some(runtime) = sweeper.as_mut() {
        if let Err(e) = runtime.stop().await {
            warn!(error = %e, "cache sweeper did not stop cleanly");
        }
    }
    info!("CareGate API stopped");
    Ok(())
}
