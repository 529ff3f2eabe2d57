//! The surge watch loop.
//!
//! Each cycle walks the active watches in registration order:
//!   1. take a turn on the shared [`PacedSource`] (backoff, jitter, spacing),
//!   2. fetch current events (cancellable while in flight),
//!   3. record each event in the ledger; only first sightings notify.
//!
//! The ledger write always precedes dispatch, so a crash in between loses a
//! notification rather than duplicating one.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::logger::{TraceId, annotate_artist, cycle_span, warn_if_slow};
use common::time::now_ms;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};
use watch::model::{Event, SeenEventRecord};
use watch::store::{SeenEventLedger, SightingStore, WatchStore};

use crate::metrics::Counters;
use crate::pacer::{PacedSource, sleep_or_cancel};
use crate::types::{FetchError, Notifier, SchedulerConfig, SchedulerError, SurgeNotice};

const SLOW_STORE_OP: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Deduplicating,
    Notifying,
}

/// Outcome of one pass over the active watches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub watches: usize,
    pub artists_polled: usize,
    pub artists_failed: usize,
    pub rate_limited: usize,
    pub events_seen: usize,
    pub new_events: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    /// The cycle stopped early because of a stop signal.
    pub cancelled: bool,
}

enum FetchOutcome {
    Events(Vec<Event>),
    Failed,
    Cancelled,
}

pub struct SurgeScheduler {
    cfg: SchedulerConfig,
    watches: Arc<dyn WatchStore>,
    ledger: Arc<dyn SeenEventLedger>,
    sightings: Option<Arc<dyn SightingStore>>,
    source: Arc<PacedSource>,
    notifier: Arc<dyn Notifier>,
    phase: Mutex<CyclePhase>,
    counters: Counters,
}

impl SurgeScheduler {
    pub fn new(
        cfg: SchedulerConfig,
        watches: Arc<dyn WatchStore>,
        ledger: Arc<dyn SeenEventLedger>,
        source: Arc<PacedSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cfg: cfg.normalized(),
            watches,
            ledger,
            sightings: None,
            source,
            notifier,
            phase: Mutex::new(CyclePhase::Idle),
            counters: Counters::default(),
        }
    }

    /// Records a city sighting for every new event that names a city.
    pub fn with_sightings(mut self, sightings: Arc<dyn SightingStore>) -> Self {
        self.sightings = Some(sightings);
        self
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn phase(&self) -> CyclePhase {
        *self.phase.lock()
    }

    /// Current backoff window left, zero when requests may go out.
    pub fn backoff_remaining(&self) -> Duration {
        self.source.backoff_remaining()
    }

    fn set_phase(&self, phase: CyclePhase) {
        *self.phase.lock() = phase;
    }

    /// Runs cycles until `cancel` fires or a registry/ledger failure occurs.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SchedulerError> {
        info!(
            poll_secs = self.cfg.poll_interval.as_secs(),
            "surge watch loop started"
        );

        while !cancel.is_cancelled() {
            let trace_id = TraceId::new();
            let result = self
                .run_cycle(now_ms(), &cancel)
                .instrument(cycle_span(&trace_id))
                .await;

            let report = match result {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!(error = %err, "surge watch loop halted");
                    self.set_phase(CyclePhase::Idle);
                    return Err(err);
                }
            };

            info!(
                trace_id = %trace_id,
                watches = report.watches,
                polled = report.artists_polled,
                failed = report.artists_failed,
                new_events = report.new_events,
                "surge cycle complete"
            );

            if !sleep_or_cancel(self.cfg.poll_interval, &cancel).await {
                break;
            }
        }

        info!("surge watch loop stopped");
        Ok(())
    }

    /// One pass over the active watches at wall-clock `now_ms`.
    pub async fn run_cycle(
        &self,
        now_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, SchedulerError> {
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);
        let mut report = CycleReport::default();

        let watches = warn_if_slow("watch_list", SLOW_STORE_OP, self.watches.list_active(now_ms))
            .await
            .map_err(SchedulerError::Registry)?;
        report.watches = watches.len();

        if watches.is_empty() {
            debug!("no active surge watches");
        }

        for watch in &watches {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            annotate_artist(&watch.artist_key);
            self.set_phase(CyclePhase::Fetching);

            let events = match self.fetch_paced(&watch.artist_key, cancel, &mut report).await {
                FetchOutcome::Events(events) => events,
                FetchOutcome::Failed => {
                    report.artists_failed += 1;
                    self.counters.artists_failed.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                FetchOutcome::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            };

            report.artists_polled += 1;
            self.counters.artists_polled.fetch_add(1, Ordering::Relaxed);

            self.process_events(&watch.artist_key, &events, now_ms, &mut report)
                .await?;
        }

        self.set_phase(CyclePhase::Idle);
        Ok(report)
    }

    async fn fetch_paced(
        &self,
        artist_key: &str,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> FetchOutcome {
        let Some(result) = self.source.fetch_until_cancelled(artist_key, cancel).await else {
            return FetchOutcome::Cancelled;
        };

        match result {
            Ok(events) => FetchOutcome::Events(events),
            Err(FetchError::Malformed(reason)) => {
                warn!(%reason, "malformed upstream payload; treating as no events");
                FetchOutcome::Events(Vec::new())
            }
            Err(FetchError::RateLimited { .. }) => {
                report.rate_limited += 1;
                self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                FetchOutcome::Failed
            }
            Err(err @ FetchError::Unavailable(_)) => {
                warn!(error = %err, "event fetch failed");
                FetchOutcome::Failed
            }
        }
    }

    #[instrument(skip(self, events, report), fields(count = events.len()))]
    async fn process_events(
        &self,
        artist_key: &str,
        events: &[Event],
        now_ms: u64,
        report: &mut CycleReport,
    ) -> Result<(), SchedulerError> {
        self.set_phase(CyclePhase::Deduplicating);

        for event in events {
            report.events_seen += 1;

            let record = SeenEventRecord::from_event(artist_key, event, now_ms);
            let is_new = self
                .ledger
                .record_if_new(&record)
                .await
                .map_err(SchedulerError::Ledger)?;
            if !is_new {
                continue;
            }

            report.new_events += 1;
            self.counters.events_new.fetch_add(1, Ordering::Relaxed);
            debug!(event_id = %record.event_id, "new event");

            if let (Some(sightings), Some(city)) = (&self.sightings, record.city.as_deref()) {
                if let Err(err) = sightings.record_sighting(artist_key, city, now_ms).await {
                    self.counters.sighting_failed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, city, "failed to record city sighting");
                }
            }

            self.set_phase(CyclePhase::Notifying);
            let notice = SurgeNotice::new(&record, event);
            match self.notifier.notify(&notice).await {
                Ok(()) => {
                    report.notifications_sent += 1;
                    self.counters.notify_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    report.notifications_failed += 1;
                    self.counters.notify_failed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, event_id = %notice.event_id, "surge notification failed");
                }
            }
            self.set_phase(CyclePhase::Deduplicating);
        }

        Ok(())
    }
}
