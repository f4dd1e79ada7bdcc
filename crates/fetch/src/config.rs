use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::origin::OriginResolver;
use crate::proxy::ProxyConfig;
use crate::retry::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Configurable options for upstream fetching
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout for a single relayed resource (segments, keys, images, passthrough)
    pub relay_timeout: Duration,

    /// Timeout for one manifest fetch attempt
    pub manifest_timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Maximum number of redirects to follow
    pub max_redirects: usize,

    /// Spoofed user agent string
    pub user_agent: String,

    /// Spoofed `Accept-Language`
    pub accept_language: String,

    /// Retry policy for manifest fetches
    pub retry: RetryPolicy,

    /// Referer/Origin selection table
    pub origins: OriginResolver,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    // --- Connection Pool Configuration ---
    /// Maximum idle connections to keep per host
    pub pool_max_idle_per_host: usize,

    /// Duration to keep idle connections alive before closing
    pub pool_idle_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            relay_timeout: Duration::from_secs(30),
            manifest_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 5,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_owned(),
            retry: RetryPolicy::default(),
            origins: OriginResolver::default(),
            proxy: None,
            pool_max_idle_per_host: 20,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl FetchConfig {
    /// Headers sent on every upstream request, before per-request ones are added.
    ///
    /// `Accept-Encoding: identity` keeps bodies byte-exact since nothing is decompressed.
    pub fn get_default_headers(&self) -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("identity"),
        );
        if let Ok(value) = HeaderValue::from_str(&self.accept_language) {
            default_headers.insert(reqwest::header::ACCEPT_LANGUAGE, value);
        }
        default_headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
        default_headers.insert("sec-fetch-site", HeaderValue::from_static("cross-site"));
        default_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_relay_contract() {
        let cfg = FetchConfig::default();
        assert_eq!(cfg.relay_timeout, Duration::from_secs(30));
        assert_eq!(cfg.manifest_timeout, Duration::from_secs(60));
        assert_eq!(cfg.max_redirects, 5);
        assert_eq!(cfg.retry.max_attempts, 3);
    }

    #[test]
    fn default_headers_are_spoofed_cors_fetch() {
        let headers = FetchConfig::default().get_default_headers();
        assert_eq!(headers["accept"], "*/*");
        assert_eq!(headers["sec-fetch-mode"], "cors");
        assert_eq!(headers["sec-fetch-site"], "cross-site");
        assert_eq!(headers["accept-encoding"], "identity");
    }
}
