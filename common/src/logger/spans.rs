use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Span, field};

use super::TraceId;

/// Root span for one scheduler cycle.
pub fn cycle_span(trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "surge_cycle",
        trace_id = %trace_id,
        artist = field::Empty
    )
}

/// Records the artist currently being processed on the active span.
pub fn annotate_artist(artist: &str) {
    Span::current().record("artist", field::display(artist));
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
