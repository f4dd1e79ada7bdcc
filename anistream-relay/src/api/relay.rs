//! Turning upstream responses into relay responses.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use hls::ResourceKind;
use hls::resource::extension;
use media_fetch::{BufferedResponse, Upstream, UpstreamRequest};
use tracing::debug;

use crate::api::cors;
use crate::api::error::ApiResult;

pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp4";
const OCTET_STREAM: &str = "application/octet-stream";

/// Upstream headers never copied onto a streamed response.
const STRIPPED_HEADERS: &[HeaderName] = &[
    header::CONTENT_ENCODING,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
    header::CONTENT_SECURITY_POLICY,
];

/// Fetch `req` fully and answer with a fixed content type and exact length.
pub async fn relay_buffered(upstream: &Upstream, req: &UpstreamRequest) -> ApiResult<Response> {
    let response = upstream.fetch_buffered(req).await?;
    Ok(buffered_response(req, response))
}

/// Fetch `req` and pipe the body through as it arrives.
pub async fn relay_streaming(upstream: &Upstream, req: &UpstreamRequest) -> ApiResult<Response> {
    let response = upstream.fetch_streaming(req).await?;
    let status = response.status();

    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        if STRIPPED_HEADERS.contains(name) || name.as_str().starts_with("access-control-") {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    cors::apply(&mut headers);

    debug!(url = %req.url, status = %status, "Streaming passthrough response");
    let body = Body::from_stream(response.bytes_stream().map_err(std::io::Error::other));
    Ok((status, headers, body).into_response())
}

pub fn buffered_response(req: &UpstreamRequest, upstream: BufferedResponse) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        content_type(req.kind, &req.url, upstream.content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(upstream.body.len()));

    let mut status = upstream.status;
    if req.range.is_some()
        && let Some(content_range) = upstream.content_range()
    {
        status = StatusCode::PARTIAL_CONTENT;
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(header::CONTENT_RANGE, content_range.clone());
    }
    cors::apply(&mut headers);

    (status, headers, Body::from(upstream.body)).into_response()
}

fn content_type(kind: ResourceKind, url: &str, upstream: Option<&str>) -> HeaderValue {
    let from_upstream = || upstream.and_then(|v| HeaderValue::from_str(v).ok());
    match kind {
        ResourceKind::Manifest => HeaderValue::from_static(MANIFEST_CONTENT_TYPE),
        ResourceKind::Key => HeaderValue::from_static(OCTET_STREAM),
        ResourceKind::Segment => HeaderValue::from_static(SEGMENT_CONTENT_TYPE),
        ResourceKind::Image => from_upstream().unwrap_or_else(|| guess_image_type(url)),
        ResourceKind::GenericBinary | ResourceKind::Passthrough => {
            from_upstream().unwrap_or_else(|| HeaderValue::from_static(OCTET_STREAM))
        }
    }
}

fn guess_image_type(url: &str) -> HeaderValue {
    match extension(url).as_deref() {
        Some("png") => HeaderValue::from_static("image/png"),
        _ => HeaderValue::from_static("image/jpeg"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_content_types() {
        assert_eq!(
            content_type(ResourceKind::Segment, "https://a/seg.ts", Some("video/mp2t")),
            "video/mp4"
        );
        assert_eq!(
            content_type(ResourceKind::Key, "https://a/k.key", Some("text/plain")),
            OCTET_STREAM
        );
        assert_eq!(
            content_type(ResourceKind::Manifest, "https://a/i.m3u8", None),
            MANIFEST_CONTENT_TYPE
        );
    }

    #[test]
    fn image_and_binary_prefer_upstream() {
        assert_eq!(
            content_type(ResourceKind::Image, "https://a/p.PNG", None),
            "image/png"
        );
        assert_eq!(
            content_type(ResourceKind::Image, "https://a/p.jpg", Some("image/webp")),
            "image/webp"
        );
        assert_eq!(
            content_type(ResourceKind::GenericBinary, "https://a/blob", None),
            OCTET_STREAM
        );
    }
}
