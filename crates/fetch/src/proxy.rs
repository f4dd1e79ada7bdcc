use reqwest::Proxy;

use crate::error::FetchError;

/// Outbound proxy flavours.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum ProxyType {
    /// HTTP proxy
    Http,
    /// HTTPS proxy
    Https,
    /// SOCKS5 proxy
    Socks5,
}

/// Proxy authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Outbound proxy used for every upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    /// Parse a proxy URL, inferring the type from its scheme.
    ///
    /// Credentials embedded as `user:pass@` are lifted into [`ProxyAuth`].
    pub fn from_url(raw: &str) -> Result<Self, FetchError> {
        let parsed = url::Url::parse(raw)
            .map_err(|e| FetchError::proxy_configuration(format!("invalid proxy URL `{raw}`: {e}")))?;

        let proxy_type = match parsed.scheme() {
            "http" => ProxyType::Http,
            "https" => ProxyType::Https,
            "socks5" | "socks5h" => ProxyType::Socks5,
            other => {
                return Err(FetchError::proxy_configuration(format!(
                    "unsupported proxy scheme `{other}`"
                )));
            }
        };

        let auth = if parsed.username().is_empty() {
            None
        } else {
            Some(ProxyAuth {
                username: parsed.username().to_string(),
                password: parsed.password().unwrap_or_default().to_string(),
            })
        };

        let mut bare = parsed.clone();
        // Only fails for cannot-be-a-base URLs, which were rejected above.
        let _ = bare.set_username("");
        let _ = bare.set_password(None);

        Ok(Self {
            url: bare.to_string(),
            proxy_type,
            auth,
        })
    }
}

/// Build a reqwest Proxy object from our proxy configuration.
///
/// The scheme only says how to reach the proxy; every target goes through it.
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy, FetchError> {
    let proxy_url = match config.proxy_type {
        ProxyType::Socks5
            if !config.url.starts_with("socks5://") && !config.url.starts_with("socks5h://") =>
        {
            format!("socks5://{}", config.url)
        }
        _ => config.url.clone(),
    };

    let mut proxy = Proxy::all(&proxy_url).map_err(|e| {
        FetchError::proxy_configuration(format!("Invalid {:?} proxy URL: {e}", config.proxy_type))
    })?;

    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}
