//! Surge watch scheduler.
//!
//! A single long-lived loop that, every poll interval, fetches current
//! events for each active watch, records first sightings in the ledger and
//! dispatches one notification per new event. Upstream requests go through a
//! [`PacedSource`], which paces them globally and holds the one rate-limit
//! backoff shared with every other caller of the source.

pub mod backoff;
pub mod engine;
pub mod metrics;
pub mod notify;
pub mod pacer;
pub mod types;

pub use engine::{CyclePhase, CycleReport, SurgeScheduler};
pub use metrics::Counters;
pub use notify::LogNotifier;
pub use pacer::PacedSource;
pub use types::{EventSource, FetchError, Notifier, SchedulerConfig, SchedulerError, SurgeNotice};
