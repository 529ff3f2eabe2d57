//! Paced access to the upstream event source.
//!
//! Every caller that talks to the ticketing source goes through one
//! [`PacedSource`]: the scheduler loop and on-demand reports share the same
//! request spacing and the same rate-limit backoff, so a 429 seen by either
//! holds back both.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use parking_lot::Mutex;
use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use watch::model::Event;

use crate::backoff::RateLimitBackoff;
use crate::types::{EventSource, FetchError, MIN_REQUEST_SPACING, SchedulerConfig};

/// Governor clock that reads tokio's clock, so pacing follows
/// `tokio::time::pause` in tests like every other timer in the loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        Instant::now().into_std()
    }
}

type Limiter = RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<std::time::Instant>>;

/// One request per `spacing`, no bursts.
fn spacing_limiter(spacing: Duration) -> Limiter {
    let quota = Quota::with_period(spacing.max(MIN_REQUEST_SPACING))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::MIN);
    RateLimiter::direct_with_clock(quota, TokioClock)
}

/// Wraps an [`EventSource`] with global spacing, jitter and the shared
/// rate-limit backoff.
pub struct PacedSource {
    inner: Arc<dyn EventSource>,
    limiter: Limiter,
    clock: TokioClock,
    max_jitter: Duration,
    backoff: Mutex<RateLimitBackoff>,
}

impl PacedSource {
    pub fn new(inner: Arc<dyn EventSource>, cfg: &SchedulerConfig) -> Self {
        let cfg = cfg.clone().normalized();
        Self {
            inner,
            limiter: spacing_limiter(cfg.request_spacing),
            clock: TokioClock,
            max_jitter: cfg.max_jitter,
            backoff: Mutex::new(RateLimitBackoff::new(cfg.backoff_initial, cfg.backoff_max)),
        }
    }

    /// Time left on the shared backoff, zero when requests may go out.
    pub fn backoff_remaining(&self) -> Duration {
        self.backoff.lock().remaining(Instant::now())
    }

    /// Step the next 429 will start from, zero after a success.
    pub fn backoff_step(&self) -> Duration {
        self.backoff.lock().current()
    }

    /// Uniform in `[0, max_jitter]`.
    fn sample_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }

    /// Waits out the backoff, then jitter, then the next limiter cell.
    /// The request must follow the granted cell immediately so that two
    /// requests never start closer than the spacing. `false` when cancelled.
    async fn wait_turn(&self, cancel: &CancellationToken) -> bool {
        let backoff_wait = self.backoff_remaining();
        if !backoff_wait.is_zero() {
            debug!(wait_ms = backoff_wait.as_millis() as u64, "waiting out rate-limit backoff");
            if !sleep_or_cancel(backoff_wait, cancel).await {
                return false;
            }
        }

        if !sleep_or_cancel(self.sample_jitter(), cancel).await {
            return false;
        }

        while let Err(not_until) = self.limiter.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            if !sleep_or_cancel(wait, cancel).await {
                return false;
            }
        }
        true
    }

    /// Feeds one upstream outcome into the shared backoff.
    fn settle(&self, result: &Result<Vec<Event>, FetchError>) {
        match result {
            Ok(_) | Err(FetchError::Malformed(_)) => self.backoff.lock().on_success(),
            Err(FetchError::RateLimited { retry_after }) => {
                let wait = self
                    .backoff
                    .lock()
                    .on_rate_limited(Instant::now(), *retry_after);
                warn!(backoff_secs = wait.as_secs_f64(), "upstream rate limited; backing off");
            }
            Err(FetchError::Unavailable(_)) => {}
        }
    }

    /// Paced fetch that gives up as soon as `cancel` fires, including while
    /// the request is in flight. `None` means cancelled.
    pub async fn fetch_until_cancelled(
        &self,
        artist_key: &str,
        cancel: &CancellationToken,
    ) -> Option<Result<Vec<Event>, FetchError>> {
        if !self.wait_turn(cancel).await {
            return None;
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            r = self.inner.fetch_events(artist_key) => r,
        };

        self.settle(&result);
        Some(result)
    }
}

#[async_trait]
impl EventSource for PacedSource {
    async fn fetch_events(&self, artist_key: &str) -> Result<Vec<Event>, FetchError> {
        let never = CancellationToken::new();
        self.fetch_until_cancelled(artist_key, &never)
            .await
            .unwrap_or_else(|| Err(FetchError::Unavailable("request cancelled".to_string())))
    }
}

/// `false` when cancelled before `dur` elapsed.
pub(crate) async fn sleep_or_cancel(dur: Duration, cancel: &CancellationToken) -> bool {
    if dur.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(dur) => true,
    }
}
