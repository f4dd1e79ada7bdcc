// Upstream Fetcher: one shared client, spoofed headers, relay and manifest fetch semantics.

use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use hls::{Manifest, ManifestError, ResourceKind};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, instrument, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::origin::SpoofedOrigin;
use crate::proxy::build_proxy_from_config;
use crate::retry::{RetryAction, retry_with_backoff};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// A single outbound request as seen by the relay.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    /// Decoded absolute target URL
    pub url: String,
    pub kind: ResourceKind,
    pub spoof: SpoofedOrigin,
    /// Client `Range` header, forwarded verbatim
    pub range: Option<HeaderValue>,
}

impl UpstreamRequest {
    /// Validate `target` and build a request for it.
    ///
    /// Only absolute http(s) URLs are accepted.
    pub fn new(
        target: &str,
        explicit_referer: Option<&str>,
        range: Option<HeaderValue>,
        config: &FetchConfig,
    ) -> Result<Self, FetchError> {
        let parsed =
            url::Url::parse(target).map_err(|e| FetchError::invalid_url(target, e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FetchError::invalid_url(
                    target,
                    format!("unsupported scheme `{other}`"),
                ));
            }
        }
        if parsed.host_str().is_none() {
            return Err(FetchError::invalid_url(target, "missing host"));
        }

        Ok(Self {
            url: target.to_string(),
            kind: ResourceKind::classify(target),
            spoof: config.origins.resolve(target, explicit_referer),
            range,
        })
    }
}

/// A fully read upstream response.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BufferedResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn content_range(&self) -> Option<&HeaderValue> {
        self.headers.get(reqwest::header::CONTENT_RANGE)
    }
}

/// Shared upstream client. One per process; cheap to clone behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: Client,
    config: FetchConfig,
}

impl Upstream {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        install_rustls_provider();

        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(config.get_default_headers())
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_nodelay(true)
            .no_gzip()
            .no_deflate();

        if let Some(proxy) = &config.proxy {
            info!(proxy_url = %proxy.url, proxy_type = ?proxy.proxy_type, "Using upstream proxy");
            builder = builder.proxy(build_proxy_from_config(proxy)?);
        }

        let client = builder
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Build a request for `target` using this client's configuration.
    pub fn request(
        &self,
        target: &str,
        explicit_referer: Option<&str>,
        range: Option<HeaderValue>,
    ) -> Result<UpstreamRequest, FetchError> {
        UpstreamRequest::new(target, explicit_referer, range, &self.config)
    }

    fn request_headers(&self, req: &UpstreamRequest) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        let referer = HeaderValue::from_str(&req.spoof.referer)
            .map_err(|_| FetchError::invalid_url(&req.spoof.referer, "referer is not a valid header value"))?;
        let origin = HeaderValue::from_str(&req.spoof.origin)
            .map_err(|_| FetchError::invalid_url(&req.spoof.origin, "origin is not a valid header value"))?;

        headers.insert(reqwest::header::REFERER, referer);
        headers.insert(reqwest::header::ORIGIN, origin);
        headers.insert(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static(req.kind.fetch_dest()),
        );
        if let Some(range) = &req.range {
            headers.insert(reqwest::header::RANGE, range.clone());
        }
        Ok(headers)
    }

    /// Send one GET. Any status below 500 counts as a successful fetch.
    pub async fn send(
        &self,
        req: &UpstreamRequest,
        timeout: Duration,
    ) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(req.url.as_str())
            .headers(self.request_headers(req)?)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, &req.url, timeout))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FetchError::http_status(status, &req.url));
        }
        Ok(response)
    }

    /// Relay fetch for streamed kinds: the body is left unread.
    pub async fn fetch_streaming(&self, req: &UpstreamRequest) -> Result<Response, FetchError> {
        self.send(req, self.config.relay_timeout).await
    }

    /// Relay fetch for buffered kinds: the whole body is read before returning.
    #[instrument(skip(self, req), fields(url = %req.url, kind = %req.kind))]
    pub async fn fetch_buffered(&self, req: &UpstreamRequest) -> Result<BufferedResponse, FetchError> {
        let timeout = self.config.relay_timeout;
        let response = self.send(req, timeout).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, &req.url, timeout))?;

        debug!(status = %status, bytes = body.len(), "Buffered upstream response");
        Ok(BufferedResponse {
            status,
            headers,
            body,
        })
    }

    /// Fetch and validate a manifest with bounded retries.
    ///
    /// Only transport failures are retried. A received status >= 400 or text
    /// without `#EXTM3U` fails at once.
    #[instrument(skip(self, req), fields(url = %req.url))]
    pub async fn fetch_manifest(&self, req: &UpstreamRequest) -> Result<Manifest, FetchError> {
        let timeout = self.config.manifest_timeout;

        let text = retry_with_backoff(&self.config.retry, |attempt| async move {
            debug!(attempt, "Fetching manifest");
            let response = match self.send(req, timeout).await {
                Ok(response) => response,
                Err(e) if e.is_retryable() => return RetryAction::Retry(e),
                Err(e) => return RetryAction::Fail(e),
            };

            let status = response.status();
            if status.as_u16() >= 400 {
                warn!(status = %status, "Manifest request rejected by upstream");
                return RetryAction::Fail(FetchError::http_status(status, &req.url));
            }

            match response.text().await {
                Ok(text) => RetryAction::Success(text),
                Err(e) => RetryAction::Retry(FetchError::from_reqwest(e, &req.url, timeout)),
            }
        })
        .await?;

        Manifest::parse(text, &req.url).map_err(|e| match e {
            ManifestError::MissingHeader => FetchError::InvalidManifest {
                url: req.url.clone(),
            },
            ManifestError::InvalidUrl(url) => FetchError::invalid_url(url, "not an absolute URL"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_non_http_targets() {
        let cfg = FetchConfig::default();
        assert!(matches!(
            UpstreamRequest::new("file:///etc/passwd", None, None, &cfg),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            UpstreamRequest::new("not a url", None, None, &cfg),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn request_classifies_and_spoofs() {
        let cfg = FetchConfig::default();
        let req = UpstreamRequest::new(
            "https://vault-3.padorupado.ru/stream/01/seg-4.ts",
            None,
            Some(HeaderValue::from_static("bytes=0-99")),
            &cfg,
        )
        .unwrap();
        assert_eq!(req.kind, ResourceKind::Segment);
        assert_eq!(req.spoof.referer, "https://kwik.si/");
        assert_eq!(req.range.as_ref().unwrap(), "bytes=0-99");
    }

    #[test]
    fn segment_requests_declare_video_destination() {
        let upstream = Upstream::new(FetchConfig::default()).unwrap();
        let req = upstream
            .request("https://cdn.example/v/seg.ts", Some("https://player.example/watch"), None)
            .unwrap();
        let headers = upstream.request_headers(&req).unwrap();
        assert_eq!(headers["sec-fetch-dest"], "video");
        assert_eq!(headers["referer"], "https://player.example/watch");
        assert_eq!(headers["origin"], "https://player.example");
        assert!(headers.get("range").is_none());
    }
}
