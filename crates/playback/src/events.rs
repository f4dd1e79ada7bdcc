use crate::fallback::{QualityHint, SourceFormat};
use crate::session::RecoveryState;

/// Raised once automatic recovery has nothing left to try. The host should
/// offer manual quality and format selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("playback failed on {format} source at {quality} quality after {attempts} retries")]
pub struct TerminalFailure {
    pub format: SourceFormat,
    pub quality: QualityHint,
    pub attempts: u32,
    pub last_source: Option<String>,
}

/// Things the host may want to surface, drained with
/// [`PlaybackRecoverySession::drain_events`](crate::PlaybackRecoverySession::drain_events).
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryEvent {
    SeekStarted {
        position: f64,
        was_playing: bool,
    },
    StageAdvanced {
        stage: u8,
        state: RecoveryState,
    },
    /// The episode ended with the position playable again.
    Recovered {
        stage: u8,
    },
    /// Stage 4 reloaded a cache-busted source and reset the ladder.
    SourceRefreshed {
        source: String,
    },
    BufferStarved {
        position: f64,
        lookahead: f64,
    },
    QualityDowngraded {
        quality: QualityHint,
        attempt: u32,
    },
    FormatSwitched {
        format: SourceFormat,
        source: String,
    },
    PlaybackFailed(TerminalFailure),
}
