use crate::element::MediaElement;

/// Playback position and the end of the buffered range that holds it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferWindow {
    pub current_time: f64,
    /// End of the range containing `current_time`, `0.0` when none does.
    pub buffered_end: f64,
}

impl BufferWindow {
    pub fn measure<E: MediaElement + ?Sized>(element: &E) -> Self {
        let current_time = element.current_time();
        let buffered_end = element
            .buffered()
            .iter()
            .find(|range| range.contains(current_time))
            .map(|range| range.end)
            .unwrap_or(0.0);
        Self {
            current_time,
            buffered_end,
        }
    }

    /// Seconds of playable media ahead of the position.
    pub fn lookahead(&self) -> f64 {
        (self.buffered_end - self.current_time).max(0.0)
    }

    /// Whether there is any buffered media ahead of the position.
    pub fn covers_current(&self) -> bool {
        self.buffered_end > self.current_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookahead_is_never_negative() {
        let window = BufferWindow {
            current_time: 42.0,
            buffered_end: 0.0,
        };
        assert_eq!(window.lookahead(), 0.0);
        assert!(!window.covers_current());
    }

    #[test]
    fn lookahead_measures_ahead() {
        let window = BufferWindow {
            current_time: 10.0,
            buffered_end: 25.5,
        };
        assert_eq!(window.lookahead(), 15.5);
        assert!(window.covers_current());
    }
}
