// Manifest rewriting: every segment, key and nested playlist reference is
// turned into a relay URL so the player never talks to the origin directly.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::trace;

use crate::location::ManifestLocation;
use crate::resource::ResourceKind;
use crate::wrap::ProxyRoutes;

pub const MANIFEST_HEADER: &str = "#EXTM3U";

static MEDIA_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(ts|jpg|jpeg|png|mp4|m4s|key)(\?.*)?$").unwrap());
static PLAYLIST_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.m3u8(\?.*)?$").unwrap());
static KEY_URI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"URI="([^"]*)""#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid manifest: missing {MANIFEST_HEADER} header")]
    MissingHeader,
    #[error("invalid manifest URL `{0}`")]
    InvalidUrl(String),
}

/// Whether `text` is an HLS playlist at all.
pub fn is_valid_manifest(text: &str) -> bool {
    text.contains(MANIFEST_HEADER)
}

/// A validated playlist together with the location it was fetched from.
#[derive(Debug, Clone)]
pub struct Manifest {
    raw: String,
    location: ManifestLocation,
}

/// Output of [`Manifest::rewrite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenManifest {
    pub text: String,
    pub segments: usize,
    pub playlists: usize,
    pub keys: usize,
}

impl Manifest {
    /// Validate `raw` and bind it to the URL it came from.
    ///
    /// Text without the `#EXTM3U` token is rejected; nothing is rewritten for it.
    pub fn parse(raw: impl Into<String>, url: &str) -> Result<Self, ManifestError> {
        let raw = raw.into();
        if !is_valid_manifest(&raw) {
            return Err(ManifestError::MissingHeader);
        }
        let location =
            ManifestLocation::new(url).ok_or_else(|| ManifestError::InvalidUrl(url.to_string()))?;
        Ok(Self { raw, location })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn location(&self) -> &ManifestLocation {
        &self.location
    }

    /// Rewrite the manifest line by line.
    ///
    /// Line count, order and terminators are preserved. Tag lines other than
    /// `#EXT-X-KEY` come out byte-identical.
    pub fn rewrite(&self, referer: &str, routes: &ProxyRoutes) -> RewrittenManifest {
        let mut out = RewrittenManifest {
            text: String::with_capacity(self.raw.len() * 2),
            segments: 0,
            playlists: 0,
            keys: 0,
        };

        for (idx, line) in self.raw.split('\n').enumerate() {
            if idx > 0 {
                out.text.push('\n');
            }
            let (body, cr) = match line.strip_suffix('\r') {
                Some(body) => (body, "\r"),
                None => (line, ""),
            };

            match self.rewrite_line(body, referer, routes) {
                Some((rewritten, class)) => {
                    match class {
                        LineClass::Segment => out.segments += 1,
                        LineClass::Playlist => out.playlists += 1,
                        LineClass::Key => out.keys += 1,
                    }
                    trace!(from = body, to = %rewritten, "rewrote manifest line");
                    out.text.push_str(&rewritten);
                }
                None => out.text.push_str(body),
            }
            out.text.push_str(cr);
        }

        out
    }

    fn rewrite_line(
        &self,
        line: &str,
        referer: &str,
        routes: &ProxyRoutes,
    ) -> Option<(String, LineClass)> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.starts_with('#') {
            if !trimmed.starts_with("#EXT-X-KEY") || !KEY_URI.is_match(line) {
                return None;
            }
            let replaced = KEY_URI.replace(line, |caps: &Captures<'_>| {
                let absolute = self.location.resolve(&caps[1]);
                format!(
                    "URI=\"{}\"",
                    routes.wrap_uri(ResourceKind::Key, &absolute, referer)
                )
            });
            return Some((replaced.into_owned(), LineClass::Key));
        }

        if MEDIA_LINE.is_match(trimmed) {
            let absolute = self.location.resolve(trimmed);
            let kind = match ResourceKind::classify(&absolute) {
                ResourceKind::Manifest | ResourceKind::Passthrough => ResourceKind::GenericBinary,
                kind => kind,
            };
            return Some((
                routes.wrap_uri(kind, &absolute, referer),
                LineClass::Segment,
            ));
        }

        if PLAYLIST_LINE.is_match(trimmed) {
            let absolute = self.location.resolve(trimmed);
            return Some((
                routes.wrap_uri(ResourceKind::Manifest, &absolute, referer),
                LineClass::Playlist,
            ));
        }

        None
    }
}

#[derive(Debug, Clone, Copy)]
enum LineClass {
    Segment,
    Playlist,
    Key,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE_URL: &str = "https://host.example/video/index.m3u8";
    const REFERER: &str = "https://kwik.si/";

    fn rewrite(raw: &str) -> RewrittenManifest {
        Manifest::parse(raw, SOURCE_URL)
            .unwrap()
            .rewrite(REFERER, &ProxyRoutes::default())
    }

    #[test]
    fn rewrites_reference_example() {
        let raw = "#EXTM3U\nseg1.ts\nseg2.ts?token=abc\n#EXT-X-KEY:METHOD=AES-128,URI=\"key1.key\"\nsub/playlist.m3u8";
        let expected = "#EXTM3U\n\
/api/proxy?url=https%3A%2F%2Fhost.example%2Fvideo%2Fseg1.ts&referer=https%3A%2F%2Fkwik.si%2F\n\
/api/proxy?url=https%3A%2F%2Fhost.example%2Fvideo%2Fseg2.ts%3Ftoken%3Dabc&referer=https%3A%2F%2Fkwik.si%2F\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"/api/proxy?url=https%3A%2F%2Fhost.example%2Fvideo%2Fkey1.key&referer=https%3A%2F%2Fkwik.si%2F\"\n\
/api/hls-proxy?url=https%3A%2F%2Fhost.example%2Fvideo%2Fsub%2Fplaylist.m3u8&referer=https%3A%2F%2Fkwik.si%2F";

        let out = rewrite(raw);
        assert_eq!(out.text, expected);
        assert_eq!((out.segments, out.playlists, out.keys), (2, 1, 1));
    }

    #[test]
    fn rejects_text_without_header() {
        let err = Manifest::parse("seg1.ts\nseg2.ts", SOURCE_URL).unwrap_err();
        assert_eq!(err, ManifestError::MissingHeader);
        assert!(!is_valid_manifest("<html>403</html>"));
    }

    #[test]
    fn tag_lines_are_untouched() {
        let raw = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXTINF:9.97,\nseg.ts\n#EXT-X-ENDLIST\n";
        let out = rewrite(raw);
        let before: Vec<&str> = raw.split('\n').collect();
        let after: Vec<&str> = out.text.split('\n').collect();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            if b.starts_with('#') || b.is_empty() {
                assert_eq!(b, a);
            }
        }
        assert!(after[4].starts_with("/api/proxy?url="));
    }

    #[test]
    fn preserves_crlf_terminators() {
        let out = rewrite("#EXTM3U\r\n#EXTINF:4,\r\nseg.ts\r\n");
        let lines: Vec<&str> = out.text.split("\r\n").collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "#EXTINF:4,");
        assert!(lines[2].starts_with("/api/proxy?url=https%3A%2F%2Fhost.example%2Fvideo%2Fseg.ts"));
    }

    #[test]
    fn absolute_and_root_relative_references() {
        let out = rewrite("#EXTM3U\nhttps://cdn.other/a/seg.ts\n/root/seg.m4s\n");
        let lines: Vec<&str> = out.text.lines().collect();
        assert!(lines[1].contains("url=https%3A%2F%2Fcdn.other%2Fa%2Fseg.ts"));
        assert!(lines[2].contains("url=https%3A%2F%2Fhost.example%2Froot%2Fseg.m4s"));
    }

    #[test]
    fn key_line_keeps_other_attributes() {
        let out = rewrite(
            "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.example/k?id=7\",IV=0x1234\n",
        );
        let key_line = out.text.lines().nth(1).unwrap();
        assert!(key_line.starts_with("#EXT-X-KEY:METHOD=AES-128,URI=\"/api/proxy?url="));
        assert!(key_line.ends_with("\",IV=0x1234"));
        assert!(key_line.contains("https%3A%2F%2Fkeys.example%2Fk%3Fid%3D7"));
    }

    #[test]
    fn key_without_uri_is_left_alone() {
        let out = rewrite("#EXTM3U\n#EXT-X-KEY:METHOD=NONE\n");
        assert_eq!(out.text, "#EXTM3U\n#EXT-X-KEY:METHOD=NONE\n");
        assert_eq!(out.keys, 0);
    }

    #[test]
    fn unknown_uri_lines_pass_through() {
        let out = rewrite("#EXTM3U\nsomething-else.bin\n");
        assert_eq!(out.text, "#EXTM3U\nsomething-else.bin\n");
    }

    #[test]
    fn master_playlist_variants_route_to_rewriter() {
        let raw = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n360p/index.m3u8?sig=1\n#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\nhttps://cdn.other/720p.m3u8\n";
        let out = rewrite(raw);
        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(
            lines[2],
            "/api/hls-proxy?url=https%3A%2F%2Fhost.example%2Fvideo%2F360p%2Findex.m3u8%3Fsig%3D1&referer=https%3A%2F%2Fkwik.si%2F"
        );
        assert!(lines[4].starts_with("/api/hls-proxy?url=https%3A%2F%2Fcdn.other%2F720p.m3u8"));
        assert_eq!(out.playlists, 2);
    }
}
