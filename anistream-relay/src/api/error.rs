//! API error handling.
//!
//! Relay errors are answered with a plain-text message and the same CORS
//! headers as successful responses, so browsers can read them.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use media_fetch::FetchError;

use crate::api::cors;
use crate::error::Error;

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// Mapping for the manifest route, where a received upstream status is
    /// passed through unchanged.
    pub fn from_manifest_fetch(err: FetchError) -> Self {
        match err.upstream_status() {
            Some(status) => Self::new(status, "UPSTREAM_STATUS", err.to_string()),
            None => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.message).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        cors::apply(headers);
        response
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl { .. } => ApiError::bad_request(err.to_string()),
            FetchError::InvalidManifest { .. } => {
                tracing::warn!(error = %err, "Rejecting invalid manifest");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INVALID_MANIFEST",
                    format!("Invalid manifest: {err}"),
                )
            }
            _ => {
                tracing::error!(error = %err, "Upstream fetch failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_ERROR",
                    format!("Proxy request failed: {err}"),
                )
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Fetch(e) => e.into(),
            other => {
                tracing::error!(error = %other, "Unexpected error");
                ApiError::internal(other.to_string())
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_bad_request() {
        let err: ApiError = FetchError::invalid_url("ftp://x", "unsupported scheme `ftp`").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("ftp://x"));
    }

    #[test]
    fn manifest_route_keeps_upstream_status() {
        let err = FetchError::http_status(StatusCode::FORBIDDEN, "https://cdn.example/a.m3u8");
        assert_eq!(
            ApiError::from_manifest_fetch(err).status,
            StatusCode::FORBIDDEN
        );

        let err = FetchError::http_status(StatusCode::BAD_GATEWAY, "https://cdn.example/a.ts");
        let relay: ApiError = err.into();
        assert_eq!(relay.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_response_is_plain_text_with_cors() {
        let response = ApiError::bad_request("Missing url parameter").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
