//! Cache-backed OAuth2 token lifecycle
//!
//! Access tokens live in the cache under a TTL shorter than their real
//! lifetime, so a cache hit is always a token the provider still honors.
//! On a miss, a uuid lease on `auth:refresh_lock` (claimed with
//! `set_if_absent`) makes the grant single-flight across the fleet;
//! losers wait briefly for the winner's token to appear, and the lease
//! TTL bounds what a crashed winner can cost.
//!
//! Cache trouble never blocks authentication: the flow degrades to a
//! direct grant without coordination.

use std::sync::Arc;
use std::time::Duration;

use caregate_common::cache::CacheStore;
use caregate_domain::constants::{
    ACCESS_TOKEN_KEY, REFRESH_LOCK_KEY, REFRESH_LOCK_TTL_SECS, REFRESH_LOCK_WAIT_MS,
    REFRESH_TOKEN_KEY,
};
use caregate_domain::{CareGateError, ProviderSettings, Result};
use tracing::{debug, warn};
use uuid::Uuid;

use super::auth_client::AuthGrant;
use super::types::{GrantResponse, ProviderAuthError, TokenStatus};

/// Token lifecycle coordinator over the shared cache.
pub struct TokenManager<A: AuthGrant> {
    store: Arc<dyn CacheStore>,
    auth: A,
    access_margin: Duration,
    refresh_fallback_ttl: Duration,
}

impl<A: AuthGrant> TokenManager<A> {
    pub fn new(store: Arc<dyn CacheStore>, auth: A, settings: &ProviderSettings) -> Self {
        Self {
            store,
            auth,
            access_margin: Duration::from_secs(settings.access_margin_secs),
            refresh_fallback_ttl: Duration::from_secs(settings.refresh_ttl_secs),
        }
    }

    /// Return a valid access token, granting a new one only when the cache
    /// has none.
    ///
    /// # Errors
    /// `Unauthorized` when the provider rejects the credentials, `Transient`
    /// when the provider is unreachable or another instance's refresh is
    /// still in flight.
    pub async fn get_access_token(&self) -> Result<String> {
        match self.store.get(ACCESS_TOKEN_KEY).await {
            Ok(Some(token)) => return Ok(token),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "token cache read failed, proceeding to grant"),
        }
        self.refresh_under_lock(true).await
    }

    /// Force a refresh regardless of what is cached.
    ///
    /// # Errors
    /// Same classification as [`get_access_token`](Self::get_access_token).
    pub async fn refresh_access_token(&self) -> Result<String> {
        self.refresh_under_lock(false).await
    }

    /// Drop every token artifact from the cache, lock included.
    ///
    /// # Errors
    /// `Internal` when the cache rejects a delete.
    pub async fn clear_token_cache(&self) -> Result<()> {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, REFRESH_LOCK_KEY] {
            self.store.delete(key).await.map_err(|e| {
                CareGateError::Internal(format!("failed to clear token cache: {e}"))
            })?;
        }
        Ok(())
    }

    /// Cache-derived token state for diagnostics. Never returns token bytes.
    pub async fn token_status(&self) -> TokenStatus {
        let access_token_cached =
            matches!(self.store.get(ACCESS_TOKEN_KEY).await, Ok(Some(_)));
        let access_expires_in_secs = match self.store.ttl(ACCESS_TOKEN_KEY).await {
            Ok(ttl) => ttl.remaining_secs(),
            Err(_) => None,
        };
        let refresh_token_cached =
            matches!(self.store.get(REFRESH_TOKEN_KEY).await, Ok(Some(_)));
        let refresh_expires_in_secs = match self.store.ttl(REFRESH_TOKEN_KEY).await {
            Ok(ttl) => ttl.remaining_secs(),
            Err(_) => None,
        };
        TokenStatus {
            access_token_cached,
            access_expires_in_secs,
            refresh_token_cached,
            refresh_expires_in_secs,
        }
    }

    async fn refresh_under_lock(&self, reuse_cached: bool) -> Result<String> {
        let lease = Uuid::new_v4().to_string();
        let claimed = match self
            .store
            .set_if_absent(
                REFRESH_LOCK_KEY,
                &lease,
                Some(Duration::from_secs(REFRESH_LOCK_TTL_SECS)),
            )
            .await
        {
            Ok(won) => won,
            Err(e) => {
                // No coordination available; grant directly rather than
                // failing the caller.
                warn!(error = %e, "lock claim failed, refreshing without single-flight");
                return self.obtain_and_store().await;
            }
        };

        if claimed {
            let result = self.locked_refresh(reuse_cached).await;
            // Release on every exit path; errors inside the refresh must not
            // leave the lock held for the rest of the lease.
            self.release_lock(&lease).await;
            return result;
        }

        // Loser: give the winner one lease-sized chance, then re-read once.
        tokio::time::sleep(Duration::from_millis(REFRESH_LOCK_WAIT_MS)).await;
        match self.store.get(ACCESS_TOKEN_KEY).await {
            Ok(Some(token)) => Ok(token),
            Ok(None) => {
                Err(CareGateError::Transient("token refresh in progress".to_string()))
            }
            Err(e) => Err(CareGateError::Transient(format!("token cache unavailable: {e}"))),
        }
    }

    async fn locked_refresh(&self, reuse_cached: bool) -> Result<String> {
        if reuse_cached {
            // Double-check under the lock: another instance may have stored
            // a token between the fast-path miss and the claim.
            if let Ok(Some(token)) = self.store.get(ACCESS_TOKEN_KEY).await {
                debug!("token appeared while acquiring the refresh lock");
                return Ok(token);
            }
        } else if let Err(e) = self.store.delete(ACCESS_TOKEN_KEY).await {
            warn!(error = %e, "failed to drop the stale access token before forced refresh");
        }
        self.obtain_and_store().await
    }

    async fn obtain_and_store(&self) -> Result<String> {
        let cached_refresh = match self.store.get(REFRESH_TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "refresh token read failed, using password grant");
                None
            }
        };

        let grant = match cached_refresh {
            Some(refresh_token) => match self.auth.refresh_grant(&refresh_token).await {
                Ok(grant) => grant,
                Err(err) => {
                    warn!(error = %err, "refresh grant failed, falling back to password grant");
                    if matches!(err, ProviderAuthError::Rejected(_)) {
                        // The stored refresh token is dead server-side.
                        if let Err(e) = self.store.delete(REFRESH_TOKEN_KEY).await {
                            warn!(error = %e, "failed to drop the rejected refresh token");
                        }
                    }
                    self.auth.password_grant().await.map_err(map_grant_error)?
                }
            },
            None => self.auth.password_grant().await.map_err(map_grant_error)?,
        };

        self.store_grant(&grant).await;
        Ok(grant.access_token)
    }

    /// Cache writes are best-effort: the grant already succeeded, so the
    /// caller gets its token even when the cache refuses the write.
    async fn store_grant(&self, grant: &GrantResponse) {
        let lifetime = u64::try_from(grant.expires_in.max(0)).unwrap_or(0);
        let margin = self.access_margin.as_secs();
        if lifetime > margin {
            let ttl = Duration::from_secs(lifetime - margin);
            if let Err(e) =
                self.store.set(ACCESS_TOKEN_KEY, &grant.access_token, Some(ttl)).await
            {
                warn!(error = %e, "failed to cache the access token");
            }
        } else {
            // A token that lives no longer than the margin is spent on
            // arrival; the next caller grants again.
            debug!(lifetime_secs = lifetime, "access token lifetime within the margin, not cached");
        }

        if let Some(refresh_token) = &grant.refresh_token {
            let ttl = grant
                .refresh_expires_in
                .and_then(|secs| u64::try_from(secs).ok())
                .filter(|secs| *secs > 0)
                .map_or(self.refresh_fallback_ttl, Duration::from_secs);
            if let Err(e) = self.store.set(REFRESH_TOKEN_KEY, refresh_token, Some(ttl)).await {
                warn!(error = %e, "failed to cache the refresh token");
            }
        }
    }

    async fn release_lock(&self, lease: &str) {
        // Delete only a lease this instance still owns; a lock that expired
        // mid-refresh may have been claimed by someone else.
        match self.store.get(REFRESH_LOCK_KEY).await {
            Ok(Some(holder)) if holder == lease => {
                if let Err(e) = self.store.delete(REFRESH_LOCK_KEY).await {
                    warn!(error = %e, "failed to release the refresh lock");
                }
            }
            Ok(_) => debug!("refresh lock already expired or re-claimed"),
            Err(e) => warn!(error = %e, "failed to verify refresh lock ownership"),
        }
    }
}

fn map_grant_error(err: ProviderAuthError) -> CareGateError {
    match err {
        ProviderAuthError::Rejected(reason) => CareGateError::Unauthorized(reason),
        ProviderAuthError::Transport(reason) => CareGateError::Transient(reason),
    }
}
