// Upstream side of the media relay: spoofed requests, retries and manifest loading
pub mod config;
pub mod error;
pub mod origin;
pub mod proxy;
pub mod retry;
pub mod upstream;

pub use config::{DEFAULT_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT, FetchConfig};
pub use error::FetchError;
pub use origin::{KnownDomain, OriginResolver, SpoofedOrigin};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use retry::{RetryAction, RetryPolicy, RetryState, retry_with_backoff};
pub use upstream::{BufferedResponse, Upstream, UpstreamRequest};
