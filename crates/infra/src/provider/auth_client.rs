//! HTTP client for the provider token endpoint
//!
//! Speaks `application/x-www-form-urlencoded` OAuth2 grants. Classification
//! is the whole job here: answered 4xx means the credentials are bad and a
//! retry is pointless, everything else is a transport problem the caller may
//! retry. The lifecycle manager builds its fallback logic on exactly that
//! split.

use std::time::Duration;

use async_trait::async_trait;
use caregate_common::resilience::{retry_with_config, RetryConfig};
use caregate_domain::{CareGateError, ProviderSettings, Result};
use tracing::debug;

use super::types::{GrantResponse, ProviderAuthError};

/// Token-endpoint operations the lifecycle manager depends on.
///
/// Abstracted so tests can count grants and script failures without a
/// network.
#[async_trait]
pub trait AuthGrant: Send + Sync {
    /// Exchange a refresh token for a fresh access token.
    async fn refresh_grant(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<GrantResponse, ProviderAuthError>;

    /// Authenticate from scratch with the service-account credentials.
    async fn password_grant(&self) -> std::result::Result<GrantResponse, ProviderAuthError>;
}

#[async_trait]
impl<T: AuthGrant + ?Sized> AuthGrant for std::sync::Arc<T> {
    async fn refresh_grant(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<GrantResponse, ProviderAuthError> {
        (**self).refresh_grant(refresh_token).await
    }

    async fn password_grant(&self) -> std::result::Result<GrantResponse, ProviderAuthError> {
        (**self).password_grant().await
    }
}

/// reqwest-based client for the provider's OAuth2 token endpoint.
pub struct ProviderAuthClient {
    http: reqwest::Client,
    settings: ProviderSettings,
}

impl ProviderAuthClient {
    /// Build the client with the configured request timeout.
    ///
    /// # Errors
    /// `CareGateError::Internal` when the TLS backend fails to initialize.
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()
            .map_err(|e| CareGateError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, settings })
    }

    async fn execute_grant(
        &self,
        params: Vec<(String, String)>,
    ) -> std::result::Result<GrantResponse, ProviderAuthError> {
        // One retry, network failures only: an answered request is final
        // whatever its status. The short budget keeps the whole exchange
        // inside the refresh lock lease.
        let response = retry_with_config(
            || async { self.http.post(&self.settings.token_url).form(&params).send().await },
            RetryConfig::new(1).with_base_delay(Duration::from_millis(500)),
        )
        .await
        .map_err(|e| ProviderAuthError::Transport(format!("token request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<GrantResponse>()
                .await
                .map_err(|e| ProviderAuthError::Transport(format!("invalid token response: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        let detail =
            if body.is_empty() { status.to_string() } else { format!("{status}: {body}") };
        if status.is_client_error() {
            Err(ProviderAuthError::Rejected(detail))
        } else {
            Err(ProviderAuthError::Transport(detail))
        }
    }
}

#[async_trait]
impl AuthGrant for ProviderAuthClient {
    async fn refresh_grant(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<GrantResponse, ProviderAuthError> {
        debug!("requesting refresh grant");
        let params = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("client_id".to_string(), self.settings.client_id.clone()),
            ("client_secret".to_string(), self.settings.client_secret.clone()),
            ("refresh_token".to_string(), refresh_token.to_string()),
        ];
        self.execute_grant(params).await
    }

    async fn password_grant(&self) -> std::result::Result<GrantResponse, ProviderAuthError> {
        debug!("requesting password grant");
        let params = vec![
            ("grant_type".to_string(), "password".to_string()),
            ("client_id".to_string(), self.settings.client_id.clone()),
            ("client_secret".to_string(), self.settings.client_secret.clone()),
            ("username".to_string(), self.settings.username.clone()),
            ("password".to_string(), self.settings.password.clone()),
        ];
        self.execute_grant(params).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_settings(token_url: String) -> ProviderSettings {
        ProviderSettings {
            token_url,
            client_id: "caregate".to_string(),
            client_secret: "secret".to_string(),
            username: "svc-user".to_string(),
            password: "svc-pass".to_string(),
            access_margin_secs: 60,
            refresh_ttl_secs: 3600,
            http_timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn password_grant_sends_credentials_and_parses_the_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=svc-user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-1",
                "expires_in": 300,
                "refresh_token": "rt-1",
                "refresh_expires_in": 86400
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ProviderAuthClient::new(test_settings(format!("{}/token", server.uri()))).unwrap();
        let grant = client.password_grant().await.unwrap();

        assert_eq!(grant.access_token, "at-1");
        assert_eq!(grant.expires_in, 300);
        assert_eq!(grant.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(grant.refresh_expires_in, Some(86400));
    }

    #[tokio::test]
    async fn refresh_grant_sends_the_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-2",
                "expires_in": 300
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ProviderAuthClient::new(test_settings(format!("{}/token", server.uri()))).unwrap();
        let grant = client.refresh_grant("rt-42").await.unwrap();

        assert_eq!(grant.access_token, "at-2");
        assert_eq!(grant.refresh_token, None);
    }

    #[tokio::test]
    async fn answered_4xx_maps_to_rejected_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_client" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ProviderAuthClient::new(test_settings(format!("{}/token", server.uri()))).unwrap();
        let err = client.password_grant().await.unwrap_err();

        assert!(matches!(err, ProviderAuthError::Rejected(_)), "got {err:?}");
        assert!(err.to_string().contains("invalid_client"));
    }

    #[tokio::test]
    async fn answered_5xx_maps_to_transport_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ProviderAuthClient::new(test_settings(format!("{}/token", server.uri()))).unwrap();
        let err = client.password_grant().await.unwrap_err();

        assert!(matches!(err, ProviderAuthError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_maps_to_transport() {
        // Port 9 is discard; nothing listens there in the test environment.
        let client =
            ProviderAuthClient::new(test_settings("http://127.0.0.1:9/token".to_string()))
                .unwrap();
        let err = client.password_grant().await.unwrap_err();

        assert!(matches!(err, ProviderAuthError::Transport(_)), "got {err:?}");
    }
}
