//! Scheduling-provider OAuth2 integration
//!
//! The provider issues short-lived access tokens through a standard OAuth2
//! token endpoint. This module owns the whole lifecycle:
//! - [`ProviderAuthClient`]: the HTTP client speaking to the token endpoint
//! - [`TokenManager`]: cache-backed storage, refresh-before-expiry, and the
//!   distributed single-flight that keeps a fleet from stampeding the
//!   provider when a token lapses

mod auth_client;
mod token_manager;
mod types;

pub use auth_client::{AuthGrant, ProviderAuthClient};
pub use token_manager::TokenManager;
pub use types::{GrantResponse, ProviderAuthError, TokenStatus};
