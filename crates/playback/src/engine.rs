//! Per-element recovery session.
//!
//! The host forwards element events and calls [`PlaybackRecoverySession::tick`]
//! no later than [`PlaybackRecoverySession::next_deadline`]. Every timer lives
//! in a [`Deadline`] slot owned by the session, so re-arming a slot always
//! supersedes the previous chain.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::buffer::BufferWindow;
use crate::element::{MediaElement, MediaErrorKind, Preload};
use crate::events::{RecoveryEvent, TerminalFailure};
use crate::fallback::{FallbackDecision, QualityFallbackState, QualityHint, SourceFormat};
use crate::session::{RecoveryState, SeekRecoverySession};
use crate::source_url::{CACHE_BUST_PARAM, SEEK_HINT_PARAM, SourceUrl};
use crate::timer::Deadline;

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Delay before judging a seek, and between ladder stages.
    pub evaluate_after: Duration,
    /// Evaluation delay after a pipeline reset.
    pub pipeline_reset_evaluate_after: Duration,
    /// How long the playback rate stays at zero after a seek starts.
    pub rate_pulse: Duration,
    /// Gap between detaching and reattaching the source.
    pub reattach_after: Duration,
    /// Seconds to step back on a micro-seek.
    pub micro_seek_back: f64,
    /// Paused this long after a seek while playback was expected counts as stuck.
    pub stalled_pause: Duration,
    pub buffer_tick: Duration,
    /// Lookahead below which preload is forced to `auto`.
    pub preload_lookahead: f64,
    /// Lookahead below which a starved element is paused to build buffer.
    pub low_lookahead: f64,
    pub buffer_pause: Duration,
    /// Seek events this soon after the session moved the playhead itself are ignored.
    pub internal_seek_grace: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            evaluate_after: Duration::from_millis(1500),
            pipeline_reset_evaluate_after: Duration::from_secs(1),
            rate_pulse: Duration::from_millis(300),
            reattach_after: Duration::from_millis(50),
            micro_seek_back: 0.25,
            stalled_pause: Duration::from_secs(2),
            buffer_tick: Duration::from_secs(1),
            preload_lookahead: 30.0,
            low_lookahead: 10.0,
            buffer_pause: Duration::from_millis(1500),
            internal_seek_grace: Duration::from_millis(500),
        }
    }
}

/// Position and play state to put back once the new pipeline has metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingRestore {
    time: f64,
    resume: bool,
}

#[derive(Debug)]
pub struct PlaybackRecoverySession {
    config: RecoveryConfig,
    state: RecoveryState,
    seek: Option<SeekRecoverySession>,

    recovery_timer: Deadline,
    rate_restore: Deadline,
    saved_rate: Option<f64>,

    reattach: Deadline,
    detached_source: Option<String>,
    pending_restore: Option<PendingRestore>,
    internal_seek_until: Option<Instant>,

    buffer_tick: Deadline,
    buffer_resume: Deadline,
    /// The element is paused because the buffer monitor paused it.
    buffer_paused: bool,

    fallback: QualityFallbackState,
    last_source: Option<String>,
    terminal: Option<TerminalFailure>,
    events: Vec<RecoveryEvent>,
}

impl PlaybackRecoverySession {
    pub fn new(config: RecoveryConfig, format: SourceFormat) -> Self {
        Self {
            config,
            state: RecoveryState::Idle,
            seek: None,
            recovery_timer: Deadline::default(),
            rate_restore: Deadline::default(),
            saved_rate: None,
            reattach: Deadline::default(),
            detached_source: None,
            pending_restore: None,
            internal_seek_until: None,
            buffer_tick: Deadline::default(),
            buffer_resume: Deadline::default(),
            buffer_paused: false,
            fallback: QualityFallbackState::new(format),
            last_source: None,
            terminal: None,
            events: Vec::new(),
        }
    }

    /// Start the buffer-health monitor and remember the element's source.
    pub fn attach<E: MediaElement + ?Sized>(&mut self, now: Instant, element: &E) {
        self.last_source = element.source();
        self.buffer_tick.arm(now, self.config.buffer_tick);
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Current ladder stage, `0` outside a recovery episode.
    pub fn stage(&self) -> u8 {
        self.seek.map(|s| s.stage()).unwrap_or(0)
    }

    pub fn fallback(&self) -> &QualityFallbackState {
        &self.fallback
    }

    pub fn terminal(&self) -> Option<&TerminalFailure> {
        self.terminal.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<RecoveryEvent> {
        std::mem::take(&mut self.events)
    }

    /// Earliest instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.recovery_timer,
            self.rate_restore,
            self.reattach,
            self.buffer_tick,
            self.buffer_resume,
        ]
        .iter()
        .filter_map(Deadline::due)
        .min()
    }

    /// Run every deadline that has passed.
    pub fn tick<E: MediaElement + ?Sized>(&mut self, now: Instant, element: &mut E) {
        if self.reattach.fire(now) {
            self.reattach_source(element);
        }
        if self.rate_restore.fire(now) {
            if element.is_seeking() {
                self.rate_restore.arm(now, self.config.rate_pulse);
            } else {
                self.restore_rate(element);
            }
        }
        if self.buffer_resume.fire(now)
            && std::mem::take(&mut self.buffer_paused)
            && element.is_paused()
        {
            debug!("Resuming after buffer pause");
            self.try_play(element);
        }
        if self.recovery_timer.fire(now) {
            self.evaluate(now, element);
        }
        if self.buffer_tick.fire(now) {
            self.buffer_tick.arm(now, self.config.buffer_tick);
            self.check_buffer_health(now, element);
        }
    }

    pub fn on_seeking<E: MediaElement + ?Sized>(&mut self, now: Instant, element: &mut E) {
        if self.internal_seek_until.is_some_and(|until| now < until) {
            debug!("Ignoring seek issued by recovery");
            return;
        }
        self.internal_seek_until = None;

        let was_playing = !element.is_paused();
        let position = element.current_time();
        self.seek = Some(SeekRecoverySession::new(now, was_playing));
        self.state = RecoveryState::Seeking;
        self.recovery_timer.arm(now, self.config.evaluate_after);

        if self.saved_rate.is_none() {
            self.saved_rate = Some(element.playback_rate());
        }
        element.set_playback_rate(0.0);
        self.rate_restore.arm(now, self.config.rate_pulse);

        debug!(position, was_playing, "Seek started");
        self.events.push(RecoveryEvent::SeekStarted {
            position,
            was_playing,
        });
    }

    pub fn on_seeked<E: MediaElement + ?Sized>(&mut self, _now: Instant, element: &mut E) {
        self.check_recovered(element);
    }

    pub fn on_progress<E: MediaElement + ?Sized>(&mut self, _now: Instant, element: &mut E) {
        self.check_recovered(element);
    }

    pub fn on_can_play<E: MediaElement + ?Sized>(&mut self, _now: Instant, element: &mut E) {
        self.check_recovered(element);
    }

    /// The element started playing. While the buffer monitor holds the element
    /// paused this hands control back to whoever pressed play, and the pending
    /// resume is dropped.
    pub fn on_play<E: MediaElement + ?Sized>(&mut self, _now: Instant, _element: &mut E) {
        if std::mem::take(&mut self.buffer_paused) {
            debug!("Buffer pause overridden");
            self.buffer_resume.clear();
        }
    }

    pub fn on_waiting<E: MediaElement + ?Sized>(&mut self, _now: Instant, element: &mut E) {
        if self.terminal.is_some() || self.detached_source.is_some() {
            return;
        }
        let window = BufferWindow::measure(element);
        element.set_preload(Preload::Auto);
        debug!(
            position = window.current_time,
            lookahead = window.lookahead(),
            "Element waiting for data"
        );
        self.events.push(RecoveryEvent::BufferStarved {
            position: window.current_time,
            lookahead: window.lookahead(),
        });
    }

    pub fn on_loaded_metadata<E: MediaElement + ?Sized>(&mut self, now: Instant, element: &mut E) {
        let Some(restore) = self.pending_restore.take() else {
            return;
        };
        debug!(time = restore.time, resume = restore.resume, "Restoring position");
        self.internal_seek_until = Some(now + self.config.internal_seek_grace);
        element.set_current_time(restore.time);
        self.restore_rate(element);
        if restore.resume {
            self.try_play(element);
        }
    }

    pub fn on_error<E: MediaElement + ?Sized>(
        &mut self,
        now: Instant,
        element: &mut E,
        kind: MediaErrorKind,
    ) {
        if !kind.is_hard() || self.terminal.is_some() {
            return;
        }
        if self.detached_source.is_some() {
            debug!(%kind, "Ignoring error while source is detached");
            return;
        }
        let Some(current) = element.source().or_else(|| self.last_source.clone()) else {
            warn!(%kind, "Hard media error with no source to retry");
            return;
        };
        warn!(%kind, source = %current, "Hard media error");

        // A reload supersedes any seek episode in flight.
        self.end_episode();

        match self.fallback.on_hard_error(&current) {
            FallbackDecision::Reload {
                source,
                quality,
                attempt,
            } => {
                self.reload(now, element, &source);
                self.events
                    .push(RecoveryEvent::QualityDowngraded { quality, attempt });
            }
            FallbackDecision::SwitchFormat { source } => {
                self.reload(now, element, &source);
                self.events.push(RecoveryEvent::FormatSwitched {
                    format: self.fallback.format(),
                    source,
                });
            }
            FallbackDecision::Exhausted => {
                let failure = TerminalFailure {
                    format: self.fallback.format(),
                    quality: self.fallback.quality(),
                    attempts: self.fallback.hard_errors(),
                    last_source: Some(current),
                };
                warn!(error = %failure, "Automatic recovery exhausted");
                element.pause();
                self.recovery_timer.clear();
                self.buffer_resume.clear();
                self.terminal = Some(failure.clone());
                self.events.push(RecoveryEvent::PlaybackFailed(failure));
            }
        }
    }

    /// Load a source the user picked after a terminal failure (or at any time),
    /// with a fresh retry budget.
    pub fn select_manually<E: MediaElement + ?Sized>(
        &mut self,
        now: Instant,
        element: &mut E,
        source: &str,
        format: SourceFormat,
        quality: QualityHint,
    ) {
        info!(%format, %quality, "Manual source selection");
        self.fallback.reset_manual(format, quality);
        self.terminal = None;
        self.end_episode();
        self.reload(now, element, source);
    }

    fn evaluate<E: MediaElement + ?Sized>(&mut self, now: Instant, element: &mut E) {
        let Some(seek) = self.seek else {
            return;
        };
        if self.is_stuck(now, element, &seek) {
            self.advance(now, element);
        } else {
            self.recover(element, seek.stage());
        }
    }

    fn is_stuck<E: MediaElement + ?Sized>(
        &self,
        now: Instant,
        element: &E,
        seek: &SeekRecoverySession,
    ) -> bool {
        if element.is_seeking() {
            return true;
        }
        if !seek.was_playing() {
            return false;
        }
        let window = BufferWindow::measure(element);
        if !element.ready_state().can_play() || !window.covers_current() {
            return true;
        }
        element.is_paused() && now.duration_since(seek.started_at()) > self.config.stalled_pause
    }

    fn advance<E: MediaElement + ?Sized>(&mut self, now: Instant, element: &mut E) {
        let Some(seek) = self.seek.as_mut() else {
            return;
        };
        let state = seek.advance();
        let stage = seek.stage();
        let was_playing = seek.was_playing();
        self.state = state;
        info!(stage, %state, "Seek still stuck, escalating");
        self.events
            .push(RecoveryEvent::StageAdvanced { stage, state });

        match state {
            RecoveryState::PreloadNudge => {
                element.set_preload(Preload::Auto);
                if was_playing {
                    self.try_play(element);
                }
                self.recovery_timer.arm(now, self.config.evaluate_after);
            }
            RecoveryState::MicroSeek => {
                let target = (element.current_time() - self.config.micro_seek_back).max(0.0);
                self.internal_seek_until = Some(now + self.config.internal_seek_grace);
                element.set_current_time(target);
                self.try_play(element);
                self.recovery_timer.arm(now, self.config.evaluate_after);
            }
            RecoveryState::PipelineReset => {
                self.pending_restore = Some(PendingRestore {
                    time: element.current_time(),
                    resume: was_playing,
                });
                self.restore_rate(element);
                element.pause();
                self.detached_source = element.source().or_else(|| self.last_source.clone());
                element.set_source(None);
                element.load();
                self.reattach.arm(now, self.config.reattach_after);
                self.recovery_timer
                    .arm(now, self.config.pipeline_reset_evaluate_after);
            }
            RecoveryState::SourceRefresh => {
                self.refresh_source(now, element, was_playing);
                // Optimistic: the ladder restarts without waiting to see the
                // refreshed source play.
                self.end_episode();
            }
            RecoveryState::Idle | RecoveryState::Seeking => {}
        }
    }

    fn refresh_source<E: MediaElement + ?Sized>(
        &mut self,
        now: Instant,
        element: &mut E,
        was_playing: bool,
    ) {
        let Some(current) = element.source().or_else(|| self.last_source.clone()) else {
            warn!("No source to refresh");
            return;
        };
        let position = element.current_time();
        let mut source = SourceUrl::parse(&current);
        source
            .set(
                CACHE_BUST_PARAM,
                chrono::Utc::now().timestamp_millis().to_string(),
            )
            .set(SEEK_HINT_PARAM, (position.floor() as i64).to_string());
        let source = source.to_string();

        self.pending_restore = Some(PendingRestore {
            time: position,
            resume: was_playing,
        });
        self.restore_rate(element);
        element.set_source(Some(&source));
        element.load();
        self.last_source = Some(source.clone());
        self.internal_seek_until = Some(now + self.config.internal_seek_grace);
        info!(source = %source, "Refreshed source");
        self.events.push(RecoveryEvent::SourceRefreshed { source });
    }

    fn reattach_source<E: MediaElement + ?Sized>(&mut self, element: &mut E) {
        let Some(source) = self.detached_source.take() else {
            return;
        };
        debug!(source = %source, "Reattaching source");
        element.set_source(Some(&source));
        element.load();
    }

    fn reload<E: MediaElement + ?Sized>(&mut self, now: Instant, element: &mut E, source: &str) {
        self.pending_restore = Some(PendingRestore {
            time: element.current_time(),
            resume: !element.is_paused(),
        });
        self.reattach.clear();
        self.detached_source = None;
        element.set_source(Some(source));
        element.load();
        self.last_source = Some(source.to_string());
        self.internal_seek_until = Some(now + self.config.internal_seek_grace);
    }

    fn check_recovered<E: MediaElement + ?Sized>(&mut self, element: &mut E) {
        let Some(seek) = self.seek else {
            return;
        };
        if self.reattach.is_armed() || self.pending_restore.is_some() {
            return;
        }
        let window = BufferWindow::measure(element);
        if element.is_seeking() || !element.ready_state().can_play() || !window.covers_current() {
            return;
        }
        if seek.was_playing() && element.is_paused() && !self.try_play(element) {
            return;
        }
        self.recover(element, seek.stage());
    }

    fn recover<E: MediaElement + ?Sized>(&mut self, element: &mut E, stage: u8) {
        let resume = self.seek.is_some_and(|s| s.was_playing());
        self.end_episode();
        self.restore_rate(element);
        if resume && element.is_paused() {
            self.try_play(element);
        }
        if stage > 0 {
            info!(stage, "Playback recovered");
        }
        self.events.push(RecoveryEvent::Recovered { stage });
    }

    fn end_episode(&mut self) {
        self.seek = None;
        self.state = RecoveryState::Idle;
        self.recovery_timer.clear();
    }

    fn restore_rate<E: MediaElement + ?Sized>(&mut self, element: &mut E) {
        self.rate_restore.clear();
        if let Some(rate) = self.saved_rate.take() {
            element.set_playback_rate(rate);
        }
    }

    fn check_buffer_health<E: MediaElement + ?Sized>(&mut self, now: Instant, element: &mut E) {
        if self.terminal.is_some() || self.detached_source.is_some() || element.is_paused() {
            return;
        }
        let window = BufferWindow::measure(element);
        let lookahead = window.lookahead();
        if lookahead < self.config.preload_lookahead {
            element.set_preload(Preload::Auto);
        }
        if lookahead < self.config.low_lookahead
            && !element.ready_state().can_play()
            && self.state == RecoveryState::Idle
            && !self.buffer_resume.is_armed()
        {
            debug!(lookahead, "Buffer starved, pausing to build");
            element.pause();
            self.buffer_paused = true;
            self.buffer_resume.arm(now, self.config.buffer_pause);
            self.events.push(RecoveryEvent::BufferStarved {
                position: window.current_time,
                lookahead,
            });
        }
    }

    fn try_play<E: MediaElement + ?Sized>(&mut self, element: &mut E) -> bool {
        match element.play() {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Play attempt rejected");
                false
            }
        }
    }
}
