use std::time::{Duration, Instant};

/// A restartable quiet-period timer driven by the caller's clock.
///
/// Every `schedule` pushes the deadline out again; `poll` fires once after the last call
/// has been quiet for `delay`. Scheduling while pending cancels the earlier firing.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the pending firing, zero when already due.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// True exactly once per quiet period.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Debouncer;
    use std::time::{Duration, Instant};

    #[test]
    fn burst_collapses_into_one_firing() {
        let mut d = Debouncer::new(Duration::from_millis(500));
        let t0 = Instant::now();

        for i in 0..10 {
            d.schedule(t0 + Duration::from_millis(i * 100));
            assert!(!d.poll(t0 + Duration::from_millis(i * 100 + 50)));
        }

        // Last schedule at 900ms; due at 1400ms.
        assert!(!d.poll(t0 + Duration::from_millis(1399)));
        assert!(d.poll(t0 + Duration::from_millis(1400)));
        assert!(!d.poll(t0 + Duration::from_millis(5000)));
        assert!(!d.is_pending());
    }

    #[test]
    fn cancel_drops_the_pending_firing() {
        let mut d = Debouncer::new(Duration::from_millis(500));
        let t0 = Instant::now();
        d.schedule(t0);
        assert_eq!(d.remaining(t0), Some(Duration::from_millis(500)));
        d.cancel();
        assert!(!d.poll(t0 + Duration::from_secs(1)));
        assert_eq!(d.remaining(t0), None);
    }
}
