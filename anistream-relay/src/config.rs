//! Process configuration from environment variables.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use media_fetch::{FetchConfig, ProxyConfig};
use tracing::warn;

use crate::api::server::ApiServerConfig;

pub const ENV_BIND_ADDRESS: &str = "RELAY_BIND_ADDRESS";
pub const ENV_PORT: &str = "RELAY_PORT";
pub const ENV_ROUTE_PREFIX: &str = "RELAY_ROUTE_PREFIX";
pub const ENV_FETCH_TIMEOUT: &str = "RELAY_FETCH_TIMEOUT_SECS";
pub const ENV_MANIFEST_TIMEOUT: &str = "RELAY_MANIFEST_TIMEOUT_SECS";
pub const ENV_MAX_REDIRECTS: &str = "RELAY_MAX_REDIRECTS";
pub const ENV_MANIFEST_ATTEMPTS: &str = "RELAY_MANIFEST_ATTEMPTS";
pub const ENV_RETRY_BASE_MS: &str = "RELAY_RETRY_BASE_MS";
pub const ENV_USER_AGENT: &str = "RELAY_USER_AGENT";
pub const ENV_UPSTREAM_PROXY: &str = "RELAY_UPSTREAM_PROXY";
pub const ENV_LOG_DIR: &str = "LOG_DIR";

/// Everything the relay process needs to start.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub server: ApiServerConfig,
    pub fetch: FetchConfig,
}

impl RelayConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Invalid values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind_address) = non_empty(&lookup, ENV_BIND_ADDRESS) {
            config.server.bind_address = bind_address;
        }
        if let Some(port) = parse_var::<u16>(&lookup, ENV_PORT) {
            config.server.port = port;
        }
        if let Some(prefix) = lookup(ENV_ROUTE_PREFIX) {
            config.server.route_prefix = normalize_prefix(&prefix);
        }

        let fetch = &mut config.fetch;
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_FETCH_TIMEOUT).filter(|s| *s > 0) {
            fetch.relay_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_MANIFEST_TIMEOUT).filter(|s| *s > 0) {
            fetch.manifest_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var::<usize>(&lookup, ENV_MAX_REDIRECTS) {
            fetch.max_redirects = max;
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, ENV_MANIFEST_ATTEMPTS) {
            if attempts == 0 {
                warn!(key = ENV_MANIFEST_ATTEMPTS, "At least one attempt is required, keeping default");
            } else {
                fetch.retry.max_attempts = attempts;
            }
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_RETRY_BASE_MS) {
            fetch.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(user_agent) = non_empty(&lookup, ENV_USER_AGENT) {
            fetch.user_agent = user_agent;
        }
        if let Some(raw) = non_empty(&lookup, ENV_UPSTREAM_PROXY) {
            match ProxyConfig::from_url(&raw) {
                Ok(proxy) => fetch.proxy = Some(proxy),
                Err(e) => warn!(key = ENV_UPSTREAM_PROXY, error = %e, "Ignoring upstream proxy"),
            }
        }

        config
    }

    /// Directory for daily rolling log files, if any. Read before logging
    /// starts, ahead of [`from_env_or_default`](Self::from_env_or_default).
    pub fn log_dir_from_env() -> Option<PathBuf> {
        Self::log_dir_from_lookup(|key| std::env::var(key).ok())
    }

    pub fn log_dir_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        non_empty(&lookup, ENV_LOG_DIR).map(PathBuf::from)
    }
}

/// `""` or `/` mount at the root; otherwise a leading slash and no trailing one.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = non_empty(lookup, key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring invalid configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> RelayConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.server.route_prefix, "/api");
        assert_eq!(config.fetch.relay_timeout, Duration::from_secs(30));
        assert_eq!(config.fetch.manifest_timeout, Duration::from_secs(60));
        assert_eq!(config.fetch.retry.max_attempts, 3);
        assert!(RelayConfig::log_dir_from_lookup(|_| None).is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            (ENV_PORT, "9000"),
            (ENV_ROUTE_PREFIX, "media/"),
            (ENV_RETRY_BASE_MS, "250"),
            (ENV_UPSTREAM_PROXY, "socks5://user:pw@127.0.0.1:1080"),
        ]);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.route_prefix, "/media");
        assert_eq!(config.fetch.retry.base_delay, Duration::from_millis(250));
        let proxy = config.fetch.proxy.unwrap();
        assert_eq!(proxy.auth.unwrap().username, "user");
    }

    #[test]
    fn log_dir_is_trimmed_and_optional() {
        let lookup = |value: &'static str| {
            move |key: &str| (key == ENV_LOG_DIR).then(|| value.to_string())
        };
        assert_eq!(
            RelayConfig::log_dir_from_lookup(lookup(" /var/log/relay ")),
            Some(PathBuf::from("/var/log/relay"))
        );
        assert!(RelayConfig::log_dir_from_lookup(lookup("  ")).is_none());
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = load(&[
            (ENV_PORT, "not-a-port"),
            (ENV_MANIFEST_ATTEMPTS, "0"),
            (ENV_FETCH_TIMEOUT, "0"),
            (ENV_UPSTREAM_PROXY, "ftp://proxy"),
        ]);
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.fetch.retry.max_attempts, 3);
        assert_eq!(config.fetch.relay_timeout, Duration::from_secs(30));
        assert!(config.fetch.proxy.is_none());
    }

    #[test]
    fn root_prefix() {
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(" /api/ "), "/api");
    }
}
