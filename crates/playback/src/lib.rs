//! Client-side playback recovery for relayed HLS streams.
//!
//! A [`PlaybackRecoverySession`] is owned per video element. It climbs a
//! four-stage ladder when a seek gets stuck, keeps the buffer topped up, and
//! walks a quality/format fallback ladder on hard media errors. The session
//! performs no I/O and reads no clock except for the cache-busting stamp: the
//! host forwards element events and ticks it with explicit instants.

pub mod buffer;
pub mod element;
pub mod engine;
pub mod events;
pub mod fallback;
pub mod session;
pub mod source;
pub mod source_url;
pub mod timer;

pub use buffer::BufferWindow;
pub use element::{MediaElement, MediaErrorKind, PlayRejected, Preload, ReadyState, TimeRange};
pub use engine::{PlaybackRecoverySession, RecoveryConfig};
pub use events::{RecoveryEvent, TerminalFailure};
pub use fallback::{FallbackDecision, QualityFallbackState, QualityHint, SourceFormat};
pub use session::{RecoveryState, SeekRecoverySession};
pub use source::{EpisodeSources, PlaybackSource, SourceError, SourcePreference};
pub use source_url::SourceUrl;
