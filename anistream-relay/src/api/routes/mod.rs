//! API route modules.

pub mod health;
pub mod hls_proxy;
pub mod proxy;

use axum::Router;
use axum::routing::get;

use crate::api::cors;
use crate::api::server::AppState;

/// Create the main router. Relay paths come from the state's [`hls::ProxyRoutes`]
/// so rewritten URIs always match what is mounted.
pub fn create_router(state: AppState) -> Router {
    let relay_path = state.routes.relay.clone();
    let manifest_path = state.routes.manifest.clone();

    Router::new()
        .route(
            &relay_path,
            get(proxy::relay_get).options(cors::preflight),
        )
        .route(
            &manifest_path,
            get(hls_proxy::manifest_get).options(cors::preflight),
        )
        .nest("/health", health::router())
        .with_state(state)
}
