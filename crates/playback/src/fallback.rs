//! Outer ladder for hard media errors: lower the quality a few times, then try
//! the direct file once, then give up and hand control to the user.

use std::fmt::Display;

use tracing::{info, warn};

use crate::source_url::{QUALITY_PARAM, RETRY_PARAM, SourceUrl};

/// Hard errors tolerated per format before moving on.
pub const MAX_HARD_ERRORS: u32 = 3;

/// Container extension used when falling back from HLS.
pub const DIRECT_FILE_EXTENSION: &str = "mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Hls,
    DirectFile,
}

impl Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Hls => write!(f, "hls"),
            SourceFormat::DirectFile => write!(f, "direct"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityHint {
    Auto,
    High,
    Medium,
    Low,
}

impl QualityHint {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityHint::Auto => "auto",
            QualityHint::High => "high",
            QualityHint::Medium => "medium",
            QualityHint::Low => "low",
        }
    }

    /// Hint to use for the `attempt`-th retry (1-based).
    fn for_retry(attempt: u32) -> Self {
        if attempt <= 1 {
            QualityHint::Medium
        } else {
            QualityHint::Low
        }
    }
}

impl Display for QualityHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine should do about a hard error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Reload `source` at a lower quality.
    Reload {
        source: String,
        quality: QualityHint,
        attempt: u32,
    },
    /// Switch to the direct file at `source`.
    SwitchFormat { source: String },
    /// Nothing left to try automatically.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityFallbackState {
    format: SourceFormat,
    quality: QualityHint,
    hard_errors: u32,
    fallback_attempted: bool,
}

impl Default for QualityFallbackState {
    fn default() -> Self {
        Self::new(SourceFormat::Hls)
    }
}

impl QualityFallbackState {
    pub fn new(format: SourceFormat) -> Self {
        Self {
            format,
            quality: QualityHint::Auto,
            hard_errors: 0,
            // A direct file has nothing further to fall back to.
            fallback_attempted: format == SourceFormat::DirectFile,
        }
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn quality(&self) -> QualityHint {
        self.quality
    }

    pub fn hard_errors(&self) -> u32 {
        self.hard_errors
    }

    pub fn fallback_attempted(&self) -> bool {
        self.fallback_attempted
    }

    /// Decide the next step for a hard error on `current_source`.
    pub fn on_hard_error(&mut self, current_source: &str) -> FallbackDecision {
        if self.hard_errors < MAX_HARD_ERRORS {
            self.hard_errors += 1;
            self.quality = QualityHint::for_retry(self.hard_errors);

            let mut source = SourceUrl::parse(current_source);
            source
                .set(RETRY_PARAM, self.hard_errors.to_string())
                .set(QUALITY_PARAM, self.quality.as_str());

            info!(
                attempt = self.hard_errors,
                quality = %self.quality,
                format = %self.format,
                "Reloading source at lower quality"
            );
            return FallbackDecision::Reload {
                source: source.to_string(),
                quality: self.quality,
                attempt: self.hard_errors,
            };
        }

        if !self.fallback_attempted {
            self.fallback_attempted = true;
            let mut source = SourceUrl::parse(current_source);
            source.remove(RETRY_PARAM).remove(QUALITY_PARAM);
            if source.replace_manifest_extension(DIRECT_FILE_EXTENSION) {
                self.format = SourceFormat::DirectFile;
                self.quality = QualityHint::Auto;
                self.hard_errors = 0;
                let source = source.to_string();
                info!(source = %source, "Switching playback to direct file");
                return FallbackDecision::SwitchFormat { source };
            }
            warn!(source = current_source, "Cannot derive a direct file from source");
        }

        FallbackDecision::Exhausted
    }

    /// Start over after the user picked a format and quality by hand.
    pub fn reset_manual(&mut self, format: SourceFormat, quality: QualityHint) {
        self.format = format;
        self.quality = quality;
        self.hard_errors = 0;
        self.fallback_attempted = format == SourceFormat::DirectFile;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "/api/hls-proxy?url=https%3A%2F%2Fcdn.example%2Fep1%2Findex.m3u8&referer=https%3A%2F%2Fkwik.si%2F";

    #[test]
    fn retries_lower_quality_then_switches_once() {
        let mut state = QualityFallbackState::default();
        let mut current = SOURCE.to_string();
        let mut qualities = Vec::new();

        for expected_attempt in 1..=3 {
            match state.on_hard_error(&current) {
                FallbackDecision::Reload {
                    source,
                    quality,
                    attempt,
                } => {
                    assert_eq!(attempt, expected_attempt);
                    assert!(source.contains(&format!("retry={attempt}")));
                    qualities.push(quality);
                    current = source;
                }
                other => panic!("expected reload, got {other:?}"),
            }
        }
        assert_eq!(
            qualities,
            vec![QualityHint::Medium, QualityHint::Low, QualityHint::Low]
        );

        let FallbackDecision::SwitchFormat { source } = state.on_hard_error(&current) else {
            panic!("expected format switch");
        };
        assert!(source.contains("index.mp4"));
        assert!(!source.contains("retry="));
        assert_eq!(state.format(), SourceFormat::DirectFile);
        assert_eq!(state.hard_errors(), 0);
    }

    #[test]
    fn direct_file_exhaustion_is_terminal() {
        let mut state = QualityFallbackState::new(SourceFormat::DirectFile);
        let src = "/api/hls-proxy?url=https%3A%2F%2Fcdn.example%2Fep1.mp4";
        for _ in 0..3 {
            assert!(matches!(
                state.on_hard_error(src),
                FallbackDecision::Reload { .. }
            ));
        }
        assert_eq!(state.on_hard_error(src), FallbackDecision::Exhausted);
        assert_eq!(state.on_hard_error(src), FallbackDecision::Exhausted);
    }

    #[test]
    fn underivable_direct_file_is_terminal() {
        let mut state = QualityFallbackState::default();
        let src = "/stream/live";
        for _ in 0..3 {
            state.on_hard_error(src);
        }
        assert_eq!(state.on_hard_error(src), FallbackDecision::Exhausted);
        assert!(state.fallback_attempted());
        assert_eq!(state.format(), SourceFormat::Hls);
    }

    #[test]
    fn manual_reset_restores_budget() {
        let mut state = QualityFallbackState::default();
        for _ in 0..3 {
            state.on_hard_error(SOURCE);
        }
        state.reset_manual(SourceFormat::Hls, QualityHint::High);
        assert_eq!(state.hard_errors(), 0);
        assert!(!state.fallback_attempted());
        assert_eq!(state.quality(), QualityHint::High);
    }
}
