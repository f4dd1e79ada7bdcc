//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::Request;
use hls::{DEFAULT_ROUTE_PREFIX, ProxyRoutes};
use media_fetch::{FetchConfig, Upstream};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::error::{Error, Result};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Mount point of the relay routes, also used in rewritten URIs
    pub route_prefix: String,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8787,
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Process-wide upstream client and its settings
    pub upstream: Arc<Upstream>,
    /// Paths the relay is mounted on
    pub routes: Arc<ProxyRoutes>,
}

impl AppState {
    pub fn new(fetch: FetchConfig, route_prefix: &str) -> Result<Self> {
        Ok(Self {
            start_time: Instant::now(),
            upstream: Arc::new(Upstream::new(fetch)?),
            routes: Arc::new(ProxyRoutes::with_prefix(route_prefix)),
        })
    }
}

fn is_health_probe(req: &Request) -> bool {
    req.uri().path().starts_with("/health")
}

/// Build the router with all middleware and routes.
pub fn build_router(state: AppState) -> Router {
    routes::create_router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &Request| {
                if is_health_probe(req) {
                    Span::none()
                } else {
                    let mut make_span =
                        tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                    use tower_http::trace::MakeSpan;
                    make_span.make_span(req)
                }
            })
            .on_request(|req: &Request, span: &Span| {
                if span.is_disabled() || is_health_probe(req) {
                    return;
                }
                let mut on_request =
                    tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                use tower_http::trace::OnRequest;
                on_request.on_request(req, span);
            })
            .on_response(
                |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                    if span.is_disabled() {
                        return;
                    }
                    let on_response =
                        tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnResponse;
                    on_response.on_response(res, latency, span);
                },
            ),
    )
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the server and serve until the token is cancelled.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {e}")))?;

        let router = build_router(self.state.clone());
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            relay = %self.state.routes.relay,
            manifest = %self.state.routes.manifest,
            "Media relay listening on http://{}",
            addr
        );

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("Media relay shutting down...");
            })
            .await
            .map_err(|e| Error::server(e.to_string()))?;

        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
