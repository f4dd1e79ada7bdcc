use std::fmt::Display;
use std::time::Instant;

/// Where a session is in the stuck-seek ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryState {
    Idle,
    Seeking,
    PreloadNudge,
    MicroSeek,
    PipelineReset,
    SourceRefresh,
}

impl RecoveryState {
    /// State entered when the ladder reaches `stage`.
    pub fn for_stage(stage: u8) -> Self {
        match stage {
            0 => RecoveryState::Seeking,
            1 => RecoveryState::PreloadNudge,
            2 => RecoveryState::MicroSeek,
            3 => RecoveryState::PipelineReset,
            _ => RecoveryState::SourceRefresh,
        }
    }

    pub fn is_recovering(self) -> bool {
        !matches!(self, RecoveryState::Idle | RecoveryState::Seeking)
    }
}

impl Display for RecoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecoveryState::Idle => "idle",
            RecoveryState::Seeking => "seeking",
            RecoveryState::PreloadNudge => "preload-nudge",
            RecoveryState::MicroSeek => "micro-seek",
            RecoveryState::PipelineReset => "pipeline-reset",
            RecoveryState::SourceRefresh => "source-refresh",
        };
        f.write_str(name)
    }
}

/// One stuck-seek episode, from the seek start until recovery or the
/// optimistic reset after a source refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRecoverySession {
    stage: u8,
    started_at: Instant,
    was_playing: bool,
}

impl SeekRecoverySession {
    pub fn new(started_at: Instant, was_playing: bool) -> Self {
        Self {
            stage: 0,
            started_at,
            was_playing,
        }
    }

    pub fn stage(&self) -> u8 {
        self.stage
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn was_playing(&self) -> bool {
        self.was_playing
    }

    /// Move one rung up. Stages only ever increase within an episode.
    pub fn advance(&mut self) -> RecoveryState {
        self.stage = self.stage.saturating_add(1);
        RecoveryState::for_stage(self.stage)
    }
}
