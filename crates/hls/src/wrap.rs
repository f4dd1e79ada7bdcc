use crate::resource::ResourceKind;

pub const DEFAULT_ROUTE_PREFIX: &str = "/api";

/// Relay endpoints that rewritten URIs point back at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoutes {
    /// Generic binary relay, e.g. `/api/proxy`
    pub relay: String,
    /// Manifest rewriter, e.g. `/api/hls-proxy`
    pub manifest: String,
}

impl ProxyRoutes {
    /// Routes mounted under `prefix` (`""` mounts them at the root).
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            relay: format!("{prefix}/proxy"),
            manifest: format!("{prefix}/hls-proxy"),
        }
    }

    /// Wrap an absolute URL into a relay URL.
    ///
    /// Manifests are routed back through the rewriter so nested playlists get
    /// rewritten too; every other kind goes through the binary relay.
    pub fn wrap_uri(&self, kind: ResourceKind, absolute_url: &str, referer: &str) -> String {
        let route = match kind {
            ResourceKind::Manifest => &self.manifest,
            _ => &self.relay,
        };
        format!(
            "{route}?url={}&referer={}",
            urlencoding::encode(absolute_url),
            urlencoding::encode(referer)
        )
    }
}

impl Default for ProxyRoutes {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_ROUTE_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_goes_through_relay() {
        let routes = ProxyRoutes::default();
        assert_eq!(
            routes.wrap_uri(
                ResourceKind::Segment,
                "https://host.example/video/seg2.ts?token=abc",
                "https://kwik.si/"
            ),
            "/api/proxy?url=https%3A%2F%2Fhost.example%2Fvideo%2Fseg2.ts%3Ftoken%3Dabc&referer=https%3A%2F%2Fkwik.si%2F"
        );
    }

    #[test]
    fn manifest_points_back_at_rewriter() {
        let routes = ProxyRoutes::default();
        let wrapped = routes.wrap_uri(
            ResourceKind::Manifest,
            "https://host.example/video/sub/playlist.m3u8",
            "https://kwik.si/",
        );
        assert!(wrapped.starts_with("/api/hls-proxy?url=https%3A%2F%2Fhost.example"));
    }

    #[test]
    fn prefix_trailing_slash_is_ignored() {
        let routes = ProxyRoutes::with_prefix("/relay/");
        assert_eq!(routes.relay, "/relay/proxy");
        assert_eq!(routes.manifest, "/relay/hls-proxy");

        let root = ProxyRoutes::with_prefix("");
        assert_eq!(root.relay, "/proxy");
    }
}
