//! HTTP surface of the relay.

pub mod cors;
pub mod error;
pub mod relay;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState, build_router};
