use std::time::{Duration, Instant};

/// A single-shot timer slot. Arming replaces whatever was pending, so one slot
/// can never run two chains at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    due: Option<Instant>,
}

impl Deadline {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.due = Some(now + delay);
    }

    pub fn clear(&mut self) {
        self.due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    pub fn due(&self) -> Option<Instant> {
        self.due
    }

    /// Disarm and return `true` if the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if due <= now => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_replaces_previous_deadline() {
        let t0 = Instant::now();
        let mut deadline = Deadline::default();
        deadline.arm(t0, Duration::from_millis(100));
        deadline.arm(t0, Duration::from_millis(500));

        assert!(!deadline.fire(t0 + Duration::from_millis(200)));
        assert!(deadline.fire(t0 + Duration::from_millis(500)));
        assert!(!deadline.is_armed());
        assert!(!deadline.fire(t0 + Duration::from_secs(5)));
    }
}
