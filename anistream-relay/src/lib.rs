//! HLS media relay service.
//!
//! Serves `{prefix}/proxy` (generic resource relay) and `{prefix}/hls-proxy`
//! (manifest rewriter) on top of the `media-fetch` upstream client and the
//! `hls` rewriter.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;

pub use config::RelayConfig;
pub use error::{Error, Result};
