//! Unconditional CORS headers.
//!
//! Set by hand on every response, errors included, rather than through a
//! middleware layer that would answer preflights itself.

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, OPTIONS, HEAD";
pub const ALLOW_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept, Range";
pub const EXPOSE_HEADERS: &str = "Content-Length, Content-Range, Content-Type";
pub const MAX_AGE_SECS: &str = "86400";

pub fn apply(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
}

/// `OPTIONS` handler shared by both relay routes.
pub async fn preflight() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    apply(&mut headers);
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE_SECS),
    );
    (StatusCode::NO_CONTENT, headers)
}
