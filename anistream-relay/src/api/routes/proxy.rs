//! Generic media relay.
//!
//! `GET {prefix}/proxy?url=<enc>&referer=<enc>` fetches one resource with a
//! spoofed referer/origin. Known binary kinds are buffered whole before
//! answering; text-like resources are piped straight through.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::Response;
use serde::Deserialize;
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::api::relay;
use crate::api::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RelayQuery {
    pub url: Option<String>,
    pub referer: Option<String>,
    pub debug: Option<String>,
}

impl RelayQuery {
    /// Accept the query or turn its rejection into a CORS-carrying 400.
    pub fn from_extracted(query: Result<Query<Self>, QueryRejection>) -> ApiResult<Self> {
        query
            .map(|Query(q)| q)
            .map_err(|e| ApiError::bad_request(e.body_text()))
    }

    pub fn target(&self) -> ApiResult<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing url parameter"))
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    pub fn debug_enabled(&self) -> bool {
        matches!(self.debug.as_deref(), Some("1" | "true"))
    }
}

pub async fn relay_get(
    State(state): State<AppState>,
    query: Result<Query<RelayQuery>, QueryRejection>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let query = RelayQuery::from_extracted(query)?;
    let target = query.target()?;
    let range = headers.get(header::RANGE).cloned();

    let req = state.upstream.request(target, query.referer(), range)?;
    debug!(url = %req.url, kind = %req.kind, referer = %req.spoof.referer, "Relaying resource");

    if req.kind.is_buffered() {
        relay::relay_buffered(&state.upstream, &req).await
    } else {
        relay::relay_streaming(&state.upstream, &req).await
    }
}
