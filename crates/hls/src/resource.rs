use std::fmt::Display;

/// What a relayed URL points at, derived from its path extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// HLS playlist (`.m3u8`)
    Manifest,
    /// AES key (`.key`)
    Key,
    /// Media segment or progressive file (`.ts`, `.m4s`, `.mp4`, `.m4v`)
    Segment,
    /// Image (`.jpg`, `.jpeg`, `.png`)
    Image,
    /// Anything else that is not known to be text
    GenericBinary,
    /// Text-like resources streamed straight through
    Passthrough,
}

const TEXT_EXTENSIONS: &[&str] = &[
    "vtt", "srt", "ass", "json", "txt", "html", "htm", "xml", "js", "css",
];

impl ResourceKind {
    /// Classify a URL (absolute or relative) by the extension of its path.
    ///
    /// Query strings and fragments are ignored, the comparison is case-insensitive.
    pub fn classify(url: &str) -> Self {
        match extension(url).as_deref() {
            Some("m3u8") => Self::Manifest,
            Some("key") => Self::Key,
            Some("ts" | "m4s" | "mp4" | "m4v") => Self::Segment,
            Some("jpg" | "jpeg" | "png") => Self::Image,
            Some(ext) if TEXT_EXTENSIONS.contains(&ext) => Self::Passthrough,
            _ => Self::GenericBinary,
        }
    }

    /// Whether the body must be fully buffered before responding.
    pub fn is_buffered(self) -> bool {
        !matches!(self, Self::Passthrough)
    }

    /// Value for the outbound `Sec-Fetch-Dest` header.
    pub fn fetch_dest(self) -> &'static str {
        match self {
            Self::Segment => "video",
            Self::Image => "image",
            _ => "empty",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Manifest => write!(f, "manifest"),
            ResourceKind::Key => write!(f, "key"),
            ResourceKind::Segment => write!(f, "segment"),
            ResourceKind::Image => write!(f, "image"),
            ResourceKind::GenericBinary => write!(f, "binary"),
            ResourceKind::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// Path portion of a URL: everything before the first `?` or `#`.
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Lower-cased extension of the last path segment, if any.
pub fn extension(url: &str) -> Option<String> {
    let path = strip_query(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://cdn.example/live/index.m3u8", ResourceKind::Manifest)]
    #[case("https://cdn.example/live/INDEX.M3U8?token=1", ResourceKind::Manifest)]
    #[case("https://cdn.example/k/enc.key", ResourceKind::Key)]
    #[case("seg-001.ts", ResourceKind::Segment)]
    #[case("/v/chunk.m4s#frag", ResourceKind::Segment)]
    #[case("https://cdn.example/ep1.mp4", ResourceKind::Segment)]
    #[case("https://cdn.example/ep1.m4v", ResourceKind::Segment)]
    #[case("https://img.example/poster.jpeg", ResourceKind::Image)]
    #[case("https://img.example/poster.PNG", ResourceKind::Image)]
    #[case("https://cdn.example/subs/en.vtt", ResourceKind::Passthrough)]
    #[case("https://api.example/meta.json?x=.ts", ResourceKind::Passthrough)]
    #[case("https://cdn.example/blob", ResourceKind::GenericBinary)]
    #[case("https://cdn.example/audio.aac", ResourceKind::GenericBinary)]
    fn classifies_by_extension(#[case] url: &str, #[case] expected: ResourceKind) {
        assert_eq!(ResourceKind::classify(url), expected);
    }

    #[test]
    fn dotted_directory_does_not_count_as_extension() {
        assert_eq!(extension("https://cdn.v2.example/stream"), None);
        assert_eq!(extension("https://cdn.example/.hidden"), None);
    }

    #[test]
    fn fetch_dest_follows_kind() {
        assert_eq!(ResourceKind::Segment.fetch_dest(), "video");
        assert_eq!(ResourceKind::Image.fetch_dest(), "image");
        assert_eq!(ResourceKind::Key.fetch_dest(), "empty");
        assert_eq!(ResourceKind::Manifest.fetch_dest(), "empty");
    }

    #[test]
    fn only_passthrough_is_streamed() {
        assert!(ResourceKind::Manifest.is_buffered());
        assert!(ResourceKind::GenericBinary.is_buffered());
        assert!(!ResourceKind::Passthrough.is_buffered());
    }
}
