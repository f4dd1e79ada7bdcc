use url::Url;

use crate::resource::strip_query;

/// Where a manifest was fetched from, used to absolutize the references it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLocation {
    base_url: String,
    origin: String,
    base_path: String,
}

impl ManifestLocation {
    /// Build the location of a manifest from its absolute URL.
    ///
    /// Returns `None` when the URL is not absolute or has no host.
    pub fn new(manifest_url: &str) -> Option<Self> {
        let parsed = Url::parse(manifest_url).ok()?;
        parsed.host_str()?;

        let origin = parsed.origin().ascii_serialization();
        let path = parsed.path();
        let base_path = match path.rfind('/') {
            Some(idx) => path[..=idx].to_string(),
            None => "/".to_string(),
        };

        Some(Self {
            base_url: manifest_url.to_string(),
            origin,
            base_path,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `scheme://host[:port]` of the manifest.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Directory of the manifest path, always ending with `/`.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Resolve a reference found inside the manifest to an absolute URL.
    ///
    /// - `http…` references are returned as-is
    /// - `/…` references are appended to the origin
    /// - anything else is appended to origin + base path
    pub fn resolve(&self, reference: &str) -> String {
        if reference.starts_with("http") {
            reference.to_string()
        } else if reference.starts_with('/') {
            format!("{}{}", self.origin, reference)
        } else {
            format!("{}{}{}", self.origin, self.base_path, reference)
        }
    }

    /// Path of the manifest without query, useful for logging.
    pub fn path(&self) -> &str {
        let without_origin = self
            .base_url
            .strip_prefix(self.origin.as_str())
            .unwrap_or(&self.base_url);
        strip_query(without_origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_origin_and_directory() {
        let loc = ManifestLocation::new("https://host.example/video/index.m3u8?t=1").unwrap();
        assert_eq!(loc.origin(), "https://host.example");
        assert_eq!(loc.base_path(), "/video/");
        assert_eq!(loc.path(), "/video/index.m3u8");
    }

    #[test]
    fn keeps_non_default_port() {
        let loc = ManifestLocation::new("http://127.0.0.1:8080/a/b/master.m3u8").unwrap();
        assert_eq!(loc.origin(), "http://127.0.0.1:8080");
        assert_eq!(loc.base_path(), "/a/b/");
    }

    #[test]
    fn root_manifest_has_slash_base_path() {
        let loc = ManifestLocation::new("https://host.example/index.m3u8").unwrap();
        assert_eq!(loc.base_path(), "/");
        assert_eq!(loc.resolve("seg.ts"), "https://host.example/seg.ts");
    }

    #[test]
    fn resolves_three_reference_forms() {
        let loc = ManifestLocation::new("https://host.example/video/index.m3u8").unwrap();
        assert_eq!(
            loc.resolve("https://other.example/x.ts"),
            "https://other.example/x.ts"
        );
        assert_eq!(loc.resolve("/abs/x.ts"), "https://host.example/abs/x.ts");
        assert_eq!(
            loc.resolve("sub/x.ts?token=1"),
            "https://host.example/video/sub/x.ts?token=1"
        );
    }

    #[test]
    fn rejects_relative_manifest_url() {
        assert!(ManifestLocation::new("/video/index.m3u8").is_none());
        assert!(ManifestLocation::new("file:///tmp/index.m3u8").is_none());
    }
}
