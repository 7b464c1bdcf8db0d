//! Error types used throughout the service
//!
//! Every failure that crosses a module boundary is folded into this closed
//! set so callers can branch on error class instead of string contents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for CareGate
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CareGateError {
    /// Infrastructure trouble that is expected to clear on its own.
    /// Callers may retry after a short delay.
    #[error("Transient error: {0}")]
    Transient(String),

    /// Provider credentials could not be established. Both the refresh
    /// grant and the password grant were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Request quota exhausted for the current window.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the current window resets.
        retry_after_secs: u64,
    },

    /// Upstream rejected the request for good. Retrying will not help.
    #[error("Permanent failure: {0}")]
    Permanent(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invariant violation inside the service itself.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CareGateError {
    /// Whether the failure is worth retrying after a delay.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result type alias for CareGate operations
pub type Result<T> = std::result::Result<T, CareGateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_and_message_tags() {
        let err = CareGateError::Transient("cache unreachable".to_string());
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["type"], "Transient");
        assert_eq!(json["message"], "cache unreachable");
    }

    #[test]
    fn rate_limited_carries_retry_hint() {
        let err = CareGateError::RateLimited { retry_after_secs: 42 };
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["type"], "RateLimited");
        assert_eq!(json["message"]["retry_after_secs"], 42);
        assert_eq!(err.to_string(), "Rate limited, retry after 42s");
    }

    #[test]
    fn transient_classification() {
        assert!(CareGateError::Transient("x".into()).is_transient());
        assert!(!CareGateError::Unauthorized("x".into()).is_transient());
        assert!(!CareGateError::Permanent("x".into()).is_transient());
    }
}
