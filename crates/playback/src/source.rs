//! Episode source payloads from the metadata service, and picking the initial
//! player source from them.

use hls::{ProxyRoutes, ResourceKind};
use serde::{Deserialize, Serialize};

use crate::fallback::SourceFormat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSource {
    pub url: String,
    #[serde(rename = "isM3U8", default)]
    pub is_m3u8: bool,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub is_dub: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHeaders {
    #[serde(rename = "Referer", default)]
    pub referer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub url: String,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSources {
    #[serde(default)]
    pub sources: Vec<StreamSource>,
    #[serde(default)]
    pub headers: SourceHeaders,
    #[serde(default, alias = "sub")]
    pub subtitles: Vec<SubtitleTrack>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePreference {
    pub quality: Option<String>,
    pub dub: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSource {
    /// Relay URL to hand to the element.
    pub url: String,
    pub format: SourceFormat,
    pub quality: Option<String>,
    pub subtitles: Vec<SubtitleTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("episode has no playable sources")]
    NoSources,
    #[error("source {index} has an empty url")]
    EmptyUrl { index: usize },
}

impl EpisodeSources {
    /// Pick a source and route it through the relay.
    ///
    /// HLS sources win over direct files; within a format a matching dub flag
    /// and then a matching quality label are preferred.
    pub fn select(
        &self,
        preference: &SourcePreference,
        routes: &ProxyRoutes,
    ) -> Result<PlaybackSource, SourceError> {
        let (index, chosen) = self
            .sources
            .iter()
            .enumerate()
            .max_by_key(|(index, source)| {
                let quality_match = match (&preference.quality, &source.quality) {
                    (Some(wanted), Some(have)) => wanted.eq_ignore_ascii_case(have),
                    _ => false,
                };
                // Earlier entries win ties.
                (
                    source.is_m3u8,
                    source.is_dub == preference.dub,
                    quality_match,
                    std::cmp::Reverse(*index),
                )
            })
            .ok_or(SourceError::NoSources)?;

        let target = chosen.url.trim();
        if target.is_empty() {
            return Err(SourceError::EmptyUrl { index });
        }

        let referer = self.headers.referer.as_deref().unwrap_or("");
        let (kind, format) = if chosen.is_m3u8 {
            (ResourceKind::Manifest, SourceFormat::Hls)
        } else {
            (ResourceKind::GenericBinary, SourceFormat::DirectFile)
        };

        let subtitles = self
            .subtitles
            .iter()
            .filter(|track| !track.url.trim().is_empty())
            .map(|track| SubtitleTrack {
                url: routes.wrap_uri(ResourceKind::Passthrough, track.url.trim(), referer),
                lang: track.lang.clone(),
            })
            .collect();

        Ok(PlaybackSource {
            url: routes.wrap_uri(kind, target, referer),
            format,
            quality: chosen.quality.clone(),
            subtitles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "sources": [
            { "url": "https://cdn.example/ep1.mp4", "isM3U8": false, "quality": "1080p", "isDub": false },
            { "url": "https://cdn.example/720/index.m3u8", "isM3U8": true, "quality": "720p", "isDub": false },
            { "url": "https://cdn.example/1080/index.m3u8", "isM3U8": true, "quality": "1080p", "isDub": false }
        ],
        "headers": { "Referer": "https://kwik.si/" },
        "sub": [ { "url": "https://subs.example/en.vtt", "lang": "English" } ]
    }"#;

    #[test]
    fn prefers_hls_with_matching_quality() {
        let sources: EpisodeSources = serde_json::from_str(PAYLOAD).unwrap();
        assert_eq!(sources.subtitles.len(), 1);

        let picked = sources
            .select(
                &SourcePreference {
                    quality: Some("1080P".into()),
                    dub: false,
                },
                &ProxyRoutes::default(),
            )
            .unwrap();
        assert_eq!(picked.format, SourceFormat::Hls);
        assert_eq!(
            picked.url,
            "/api/hls-proxy?url=https%3A%2F%2Fcdn.example%2F1080%2Findex.m3u8&referer=https%3A%2F%2Fkwik.si%2F"
        );
        assert_eq!(
            picked.subtitles[0].url,
            "/api/proxy?url=https%3A%2F%2Fsubs.example%2Fen.vtt&referer=https%3A%2F%2Fkwik.si%2F"
        );
    }

    #[test]
    fn first_hls_source_without_preference() {
        let sources: EpisodeSources = serde_json::from_str(PAYLOAD).unwrap();
        let picked = sources
            .select(&SourcePreference::default(), &ProxyRoutes::default())
            .unwrap();
        assert_eq!(picked.quality.as_deref(), Some("720p"));
    }

    #[test]
    fn direct_file_goes_through_relay() {
        let sources = EpisodeSources {
            sources: vec![StreamSource {
                url: "https://cdn.example/ep1.mp4".into(),
                is_m3u8: false,
                quality: None,
                is_dub: false,
            }],
            ..Default::default()
        };
        let picked = sources
            .select(&SourcePreference::default(), &ProxyRoutes::default())
            .unwrap();
        assert_eq!(picked.format, SourceFormat::DirectFile);
        assert!(picked.url.starts_with("/api/proxy?url=https%3A%2F%2Fcdn.example%2Fep1.mp4"));
    }

    #[test]
    fn presence_checks() {
        let empty = EpisodeSources::default();
        assert_eq!(
            empty.select(&SourcePreference::default(), &ProxyRoutes::default()),
            Err(SourceError::NoSources)
        );

        let blank: EpisodeSources =
            serde_json::from_str(r#"{ "sources": [ { "url": "  ", "isM3U8": true } ] }"#).unwrap();
        assert_eq!(
            blank.select(&SourcePreference::default(), &ProxyRoutes::default()),
            Err(SourceError::EmptyUrl { index: 0 })
        );
    }
}
