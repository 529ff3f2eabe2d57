use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub cycles: Arc<AtomicU64>,

    pub artists_polled: Arc<AtomicU64>,
    pub artists_failed: Arc<AtomicU64>,
    pub rate_limited: Arc<AtomicU64>,

    pub events_new: Arc<AtomicU64>,
    pub notify_sent: Arc<AtomicU64>,
    pub notify_failed: Arc<AtomicU64>,
    pub sighting_failed: Arc<AtomicU64>,
}

impl Counters {
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
