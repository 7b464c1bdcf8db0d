//! HTTP mapping for service errors
//!
//! Every handler returns [`ApiError`]; the mapping below decides the status
//! line and retry hints. `Unauthorized` surfaces as 502 because it means the
//! scheduling provider rejected us, not that the caller's request was bad.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use caregate_domain::CareGateError;

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Wrapper carrying a service error to the HTTP boundary.
#[derive(Debug)]
pub struct ApiError(pub CareGateError);

impl From<CareGateError> for ApiError {
    fn from(err: CareGateError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            CareGateError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            CareGateError::Unauthorized(_) => StatusCode::BAD_GATEWAY,
            CareGateError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            CareGateError::Permanent(_)
            | CareGateError::Config(_)
            | CareGateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match &self.0 {
            CareGateError::RateLimited { retry_after_secs } => Some((*retry_after_secs).max(1)),
            // Transient failures usually clear quickly; tell clients to come
            // straight back.
            CareGateError::Transient(_) => Some(1),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after();

        let mut response = (status, Json(&self.0)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
