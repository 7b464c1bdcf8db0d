//! Wire and status types for the provider token flow

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Successful token-endpoint response.
///
/// Only the fields the lifecycle manager consumes are deserialized; the
/// provider may send more.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantResponse {
    /// Opaque bearer token, stored and returned verbatim.
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Present when the provider issues (or rotates) a refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Refresh token lifetime in seconds, when the provider reports one.
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
}

/// Failure modes of a token grant.
#[derive(Debug, Error)]
pub enum ProviderAuthError {
    /// The provider answered and refused (4xx). Retrying the same grant
    /// cannot succeed.
    #[error("provider rejected the grant: {0}")]
    Rejected(String),

    /// Network failure, 5xx, or an unreadable response body. A later
    /// attempt may succeed.
    #[error("provider transport failure: {0}")]
    Transport(String),
}

/// Cache-derived view of the token state.
///
/// Deliberately carries no token bytes; it is served on a diagnostics route.
#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub access_token_cached: bool,
    /// Seconds until the cached access token is evicted, when known.
    pub access_expires_in_secs: Option<u64>,
    pub refresh_token_cached: bool,
    /// Seconds until the cached refresh token is evicted, when known.
    pub refresh_expires_in_secs: Option<u64>,
}
