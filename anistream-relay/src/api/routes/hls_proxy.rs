//! Manifest rewriter.
//!
//! `GET {prefix}/hls-proxy?url=<enc>&referer=<enc>&debug=<0|1>` fetches an
//! HLS playlist with retries, validates it and rewrites every segment, key and
//! nested playlist URI to point back through the relay. Targets that are not
//! `.m3u8` take the buffered relay path.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use hls::ResourceKind;
use tracing::{debug, info};

use crate::api::cors;
use crate::api::error::{ApiError, ApiResult};
use crate::api::relay::{self, MANIFEST_CONTENT_TYPE};
use crate::api::routes::proxy::RelayQuery;
use crate::api::server::AppState;

pub async fn manifest_get(
    State(state): State<AppState>,
    query: Result<Query<RelayQuery>, QueryRejection>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let query = RelayQuery::from_extracted(query)?;
    let target = query.target()?;
    let range = headers.get(header::RANGE).cloned();

    let req = state.upstream.request(target, query.referer(), range)?;
    if req.kind != ResourceKind::Manifest {
        debug!(url = %req.url, kind = %req.kind, "Not a manifest, relaying as binary");
        return relay::relay_buffered(&state.upstream, &req).await;
    }

    let manifest = state
        .upstream
        .fetch_manifest(&req)
        .await
        .map_err(ApiError::from_manifest_fetch)?;
    let rewritten = manifest.rewrite(&req.spoof.referer, &state.routes);

    if query.debug_enabled() {
        info!(url = %req.url, manifest = %manifest.raw(), "Original manifest");
        info!(url = %req.url, manifest = %rewritten.text, "Rewritten manifest");
    }
    debug!(
        url = %req.url,
        segments = rewritten.segments,
        playlists = rewritten.playlists,
        keys = rewritten.keys,
        "Manifest rewritten"
    );

    let mut out = HeaderMap::new();
    out.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(MANIFEST_CONTENT_TYPE),
    );
    out.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store"),
    );
    cors::apply(&mut out);

    Ok((StatusCode::OK, out, rewritten.text).into_response())
}
