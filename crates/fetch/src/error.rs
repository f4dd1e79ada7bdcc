use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("upstream request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream request to {url} timed out after {}s", .after.as_secs())]
    Timeout { url: String, after: Duration },

    #[error("upstream responded with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("invalid manifest from {url}: missing #EXTM3U")]
    InvalidManifest { url: String },

    #[error("proxy configuration error: {reason}")]
    ProxyConfiguration { reason: String },

    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn proxy_configuration(reason: impl Into<String>) -> Self {
        Self::ProxyConfiguration {
            reason: reason.into(),
        }
    }

    /// Convert a transport error, splitting out timeouts so they read clearly.
    pub fn from_reqwest(source: reqwest::Error, url: &str, timeout: Duration) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                after: timeout,
            }
        } else {
            Self::Network {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Transport failures are retryable; anything carrying an upstream answer is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Network { source, .. } => crate::retry::is_retryable_reqwest_error(source),
            Self::InvalidUrl { .. }
            | Self::HttpStatus { .. }
            | Self::InvalidManifest { .. }
            | Self::ProxyConfiguration { .. }
            | Self::ClientBuild { .. } => false,
        }
    }

    /// Upstream status carried by the error, if any.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_are_final() {
        let err = FetchError::http_status(StatusCode::FORBIDDEN, "https://cdn.example/a.m3u8");
        assert!(!err.is_retryable());
        assert_eq!(err.upstream_status(), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn timeouts_are_retryable_and_mention_duration() {
        let err = FetchError::Timeout {
            url: "https://cdn.example/a.m3u8".to_string(),
            after: Duration::from_secs(60),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("60s"));
    }

    #[test]
    fn invalid_manifest_is_not_retried() {
        let err = FetchError::InvalidManifest {
            url: "https://cdn.example/a.m3u8".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.upstream_status().is_none());
    }
}
