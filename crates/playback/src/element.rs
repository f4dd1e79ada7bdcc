//! The slice of an HTML media element the recovery engine drives.

use std::fmt::Display;

/// `HTMLMediaElement.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    /// Enough data to play forward from the current position.
    pub fn can_play(self) -> bool {
        self >= ReadyState::HaveFutureData
    }
}

impl From<u8> for ReadyState {
    fn from(value: u8) -> Self {
        match value {
            0 => ReadyState::HaveNothing,
            1 => ReadyState::HaveMetadata,
            2 => ReadyState::HaveCurrentData,
            3 => ReadyState::HaveFutureData,
            _ => ReadyState::HaveEnoughData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preload {
    None,
    Metadata,
    Auto,
}

impl Display for Preload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Preload::None => write!(f, "none"),
            Preload::Metadata => write!(f, "metadata"),
            Preload::Auto => write!(f, "auto"),
        }
    }
}

/// One entry of `HTMLMediaElement.buffered`, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// `MediaError.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorKind {
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
}

impl MediaErrorKind {
    /// Errors the quality/format ladder reacts to.
    pub fn is_hard(self) -> bool {
        !matches!(self, MediaErrorKind::Aborted)
    }
}

impl Display for MediaErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaErrorKind::Aborted => write!(f, "aborted"),
            MediaErrorKind::Network => write!(f, "network"),
            MediaErrorKind::Decode => write!(f, "decode"),
            MediaErrorKind::SourceNotSupported => write!(f, "source not supported"),
        }
    }
}

/// `play()` was refused, typically by an autoplay policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("play() rejected: {0}")]
pub struct PlayRejected(pub String);

/// A video element. Implemented by the UI binding; all calls happen on the UI thread.
pub trait MediaElement {
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    fn buffered(&self) -> Vec<TimeRange>;
    fn ready_state(&self) -> ReadyState;
    fn is_paused(&self) -> bool;
    fn is_seeking(&self) -> bool;
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);
    fn set_preload(&mut self, preload: Preload);
    fn source(&self) -> Option<String>;
    /// `None` detaches the source (`removeAttribute("src")`).
    fn set_source(&mut self, source: Option<&str>);
    fn load(&mut self);
    fn play(&mut self) -> Result<(), PlayRejected>;
    fn pause(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_state_ordering() {
        assert!(!ReadyState::HaveCurrentData.can_play());
        assert!(ReadyState::HaveFutureData.can_play());
        assert_eq!(ReadyState::from(9), ReadyState::HaveEnoughData);
    }

    #[test]
    fn aborted_is_soft() {
        assert!(!MediaErrorKind::Aborted.is_hard());
        assert!(MediaErrorKind::Decode.is_hard());
    }
}
