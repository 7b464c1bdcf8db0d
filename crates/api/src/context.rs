//! Shared application state
//!
//! Built exactly once in `main` and handed to every handler through axum's
//! `State`. Holding the dependencies here keeps construction wiring in one
//! place and lets tests assemble a context from fakes.

use std::sync::Arc;

use caregate_common::cache::CacheStore;
use caregate_domain::{RateLimitSettings, Result, Settings};
use caregate_infra::cache::CacheBackend;
use caregate_infra::notify::{LogEscalation, LogSender, NotificationQueue};
use caregate_infra::provider::{ProviderAuthClient, TokenManager};

/// Everything the HTTP layer needs, behind one `Arc`.
pub struct AppContext {
    /// The cache backend selected at startup.
    pub store: Arc<dyn CacheStore>,
    /// Which backend won the startup probe, for health reporting.
    pub backend: CacheBackend,
    /// Cache-backed provider token lifecycle.
    pub tokens: TokenManager<ProviderAuthClient>,
    /// Notification retry queue shared with the background worker.
    pub queue: Arc<NotificationQueue>,
    /// Rate limiter tuning for the middleware.
    pub rate_limit: RateLimitSettings,
}

impl AppContext {
    /// Assemble the context from loaded settings and the selected store.
    ///
    /// # Errors
    /// `CareGateError::Internal` when the provider HTTP client cannot be
    /// built.
    pub fn build(
        settings: &Settings,
        store: Arc<dyn CacheStore>,
        backend: CacheBackend,
    ) -> Result<Self> {
        let auth = ProviderAuthClient::new(settings.provider.clone())?;
        let tokens = TokenManager::new(Arc::clone(&store), auth, &settings.provider);
        let queue = Arc::new(NotificationQueue::new(
            Arc::clone(&store),
            Arc::new(LogSender),
            Arc::new(LogEscalation),
            &settings.queue,
        ));

        Ok(Self {
            store,
            backend,
            tokens,
            queue,
            rate_limit: settings.rate_limit.clone(),
        })
    }
}
