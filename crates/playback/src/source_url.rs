//! Query manipulation for player source strings, which are usually
//! root-relative relay URLs such as `/api/hls-proxy?url=…&referer=…`.

use std::fmt::Display;

use url::form_urlencoded;

pub const RETRY_PARAM: &str = "retry";
pub const QUALITY_PARAM: &str = "quality";
pub const CACHE_BUST_PARAM: &str = "_t";
pub const SEEK_HINT_PARAM: &str = "seekTo";
/// Parameter holding the upstream URL in relay sources.
pub const TARGET_PARAM: &str = "url";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl {
    path: String,
    params: Vec<(String, String)>,
    fragment: Option<String>,
}

impl SourceUrl {
    pub fn parse(source: &str) -> Self {
        let (rest, fragment) = match source.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (source, None),
        };
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let params = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self {
            path: path.to_string(),
            params,
            fragment,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the first `key` in place, or append it.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.params.retain(|(k, _)| k != key);
        self
    }

    /// Swap a trailing `.m3u8` for `extension`, inside the relayed target when
    /// there is one, otherwise on the path itself.
    pub fn replace_manifest_extension(&mut self, extension: &str) -> bool {
        if let Some(target) = self.get(TARGET_PARAM).map(str::to_string) {
            return match swap_manifest_extension(&target, extension) {
                Some(swapped) => {
                    self.set(TARGET_PARAM, swapped);
                    true
                }
                None => false,
            };
        }
        match swap_manifest_extension(&self.path, extension) {
            Some(swapped) => {
                self.path = swapped;
                true
            }
            None => false,
        }
    }
}

impl Display for SourceUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)?;
        if !self.params.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.params.iter())
                .finish();
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

fn swap_manifest_extension(url: &str, extension: &str) -> Option<String> {
    let path = hls::resource::strip_query(url);
    let stem_len = path.len().checked_sub(".m3u8".len())?;
    if !path[stem_len..].eq_ignore_ascii_case(".m3u8") {
        return None;
    }
    let ext = extension.trim_start_matches('.');
    Some(format!("{}.{ext}{}", &path[..stem_len], &url[path.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_relay_source() {
        let mut src = SourceUrl::parse(
            "/api/hls-proxy?url=https%3A%2F%2Fcdn.example%2Fv%2Findex.m3u8&referer=https%3A%2F%2Fkwik.si%2F",
        );
        assert_eq!(src.path(), "/api/hls-proxy");
        assert_eq!(src.get("url"), Some("https://cdn.example/v/index.m3u8"));
        src.set(RETRY_PARAM, "1").set(QUALITY_PARAM, "medium");
        let out = src.to_string();
        assert!(out.starts_with("/api/hls-proxy?url=https%3A%2F%2Fcdn.example%2Fv%2Findex.m3u8"));
        assert!(out.ends_with("&retry=1&quality=medium"));
    }

    #[test]
    fn set_replaces_existing_value() {
        let mut src = SourceUrl::parse("/v.m3u8?retry=1&quality=medium");
        src.set(RETRY_PARAM, "2");
        assert_eq!(src.to_string(), "/v.m3u8?retry=2&quality=medium");
        src.remove(RETRY_PARAM);
        assert_eq!(src.to_string(), "/v.m3u8?quality=medium");
    }

    #[test]
    fn swaps_extension_inside_target() {
        let mut src = SourceUrl::parse(
            "/api/hls-proxy?url=https%3A%2F%2Fcdn.example%2Fv%2Findex.m3u8%3Ftoken%3D1",
        );
        assert!(src.replace_manifest_extension("mp4"));
        assert_eq!(src.get("url"), Some("https://cdn.example/v/index.mp4?token=1"));
    }

    #[test]
    fn swaps_extension_on_plain_path() {
        let mut src = SourceUrl::parse("https://cdn.example/v/index.M3U8#t=5");
        assert!(src.replace_manifest_extension(".mp4"));
        assert_eq!(src.to_string(), "https://cdn.example/v/index.mp4#t=5");
    }

    #[test]
    fn refuses_non_manifest_sources() {
        let mut src = SourceUrl::parse("https://cdn.example/v/ep1.mp4");
        assert!(!src.replace_manifest_extension("mp4"));
    }
}
