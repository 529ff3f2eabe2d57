//! Shared rate-limit backoff.
//!
//! One instance guards the whole upstream source: a 429 for any artist
//! delays every subsequent request. Waits grow 5 s, 10 s, 20 s, ... up to the
//! cap and drop back to zero after the first successful fetch.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RateLimitBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    until: Option<Instant>,
}

impl RateLimitBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: Duration::ZERO,
            until: None,
        }
    }

    /// Registers a rate-limit response and returns the wait now in force.
    ///
    /// An upstream `retry_after` longer than the computed step extends the
    /// window, still bounded by the cap.
    pub fn on_rate_limited(&mut self, now: Instant, retry_after: Option<Duration>) -> Duration {
        self.current = if self.current.is_zero() {
            self.initial
        } else {
            (self.current * 2).min(self.max)
        };

        let wait = match retry_after {
            Some(hint) if hint > self.current => hint.min(self.max),
            _ => self.current,
        };

        self.until = Some(now + wait);
        wait
    }

    pub fn on_success(&mut self) {
        self.current = Duration::ZERO;
        self.until = None;
    }

    /// Time left before the next request may go out.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}
