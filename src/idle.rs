use std::time::{Duration, Instant};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Debounced activity flag. Every signal re-arms one pending deadline; the flag drops
/// to inactive only when a deadline passes with no newer signal.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    timeout: Duration,
    active: bool,
    pending: Option<Instant>,
}

impl IdleTracker {
    /// Starts active, as if a signal had just arrived.
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            active: true,
            pending: Some(now + timeout),
        }
    }

    pub fn signal(&mut self, now: Instant) {
        self.active = true;
        self.pending = Some(now + self.timeout);
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.pending
            && now >= deadline
        {
            self.pending = None;
            self.active = false;
        }
        self.active
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn time_until_idle(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goes_idle_after_timeout_without_signals() {
        let origin = Instant::now();
        let mut tracker = IdleTracker::new(Duration::from_secs(10), origin);
        assert!(tracker.poll(origin + Duration::from_secs(9)));
        assert!(!tracker.poll(origin + Duration::from_secs(10)));
        assert!(!tracker.has_pending());
    }

    #[test]
    fn each_signal_restarts_the_countdown() {
        let origin = Instant::now();
        let mut tracker = IdleTracker::new(Duration::from_secs(10), origin);
        tracker.signal(origin + Duration::from_secs(8));
        assert!(tracker.poll(origin + Duration::from_secs(12)));
        assert_eq!(
            tracker.time_until_idle(origin + Duration::from_secs(12)),
            Some(Duration::from_secs(6))
        );
        assert!(!tracker.poll(origin + Duration::from_secs(18)));
    }

    #[test]
    fn signal_after_idle_reactivates() {
        let origin = Instant::now();
        let mut tracker = IdleTracker::new(Duration::from_secs(1), origin);
        assert!(!tracker.poll(origin + Duration::from_secs(2)));
        tracker.signal(origin + Duration::from_secs(3));
        assert!(tracker.is_active());
        assert!(tracker.has_pending());
    }

    #[test]
    fn cancel_drops_pending_deadline() {
        let origin = Instant::now();
        let mut tracker = IdleTracker::new(Duration::from_secs(1), origin);
        tracker.cancel();
        assert!(tracker.poll(origin + Duration::from_secs(5)));
        assert_eq!(tracker.time_until_idle(origin), None);
    }
}
