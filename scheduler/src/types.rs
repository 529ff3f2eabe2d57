//! Seams and shared types for the scheduler.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use watch::model::{Event, SeenEventRecord};

pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const MIN_REQUEST_SPACING: Duration = Duration::from_secs(1);

/// Why a single upstream fetch failed. None of these stop the loop.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// HTTP 429 or equivalent. `retry_after` is the upstream hint, if any.
    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The response could not be decoded; treated as "no data".
    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

/// Conditions that halt the scheduler. Continuing without the registry or
/// the ledger would risk duplicate or lost notifications.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("watch registry unreachable: {0:#}")]
    Registry(anyhow::Error),

    #[error("seen-event ledger unreachable: {0:#}")]
    Ledger(anyhow::Error),
}

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self, artist_key: &str) -> Result<Vec<Event>, FetchError>;
}

/// Fire-and-forget delivery. Errors are logged by the caller, never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &SurgeNotice) -> anyhow::Result<()>;
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Minimum gap between two upstream requests, across all artists.
    pub request_spacing: Duration,
    /// Upper bound of the uniform random delay added before each request.
    pub max_jitter: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1800),
            request_spacing: MIN_REQUEST_SPACING,
            max_jitter: Duration::from_secs(3),
            backoff_initial: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl SchedulerConfig {
    /// Applies the hard floors on poll interval and request spacing.
    pub fn normalized(mut self) -> Self {
        self.poll_interval = self.poll_interval.max(MIN_POLL_INTERVAL);
        self.request_spacing = self.request_spacing.max(MIN_REQUEST_SPACING);
        self.backoff_max = self.backoff_max.max(self.backoff_initial);
        self
    }
}

/// Payload handed to a [`Notifier`] for one newly seen event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurgeNotice {
    pub artist_key: String,
    pub event_id: String,
    pub name: String,
    pub event_time_local: Option<String>,
    pub event_time_utc: Option<String>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub url: Option<String>,
    pub presale_url: Option<String>,
    pub detected_at_ms: u64,
}

impl SurgeNotice {
    pub fn new(record: &SeenEventRecord, event: &Event) -> Self {
        Self {
            artist_key: record.artist_key.clone(),
            event_id: record.event_id.clone(),
            name: record.name.clone(),
            event_time_local: record.event_time_local.clone(),
            event_time_utc: record.event_time_utc.clone(),
            venue: record.venue.clone(),
            city: record.city.clone(),
            url: record.url.clone(),
            presale_url: event.presale_url.clone(),
            detected_at_ms: record.first_seen_ms,
        }
    }

    /// Chat-friendly message body.
    pub fn render(&self) -> String {
        let mut lines = vec![format!("🎫 New ticketing event for **{}**", self.artist_key)];

        let name = self.name.trim();
        lines.push(if name.is_empty() { "New event".to_string() } else { name.to_string() });

        if let Some(time) = self.event_time_local.as_deref().filter(|t| !t.is_empty()) {
            lines.push(format!("🗓️ {time}"));
        }

        let location: Vec<&str> = [self.venue.as_deref(), self.city.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !location.is_empty() {
            lines.push(format!("📍 {}", location.join(", ")));
        }

        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            lines.push(url.trim().to_string());
        }
        if let Some(presale) = self.presale_url.as_deref().filter(|u| !u.trim().is_empty()) {
            lines.push(format!("Presale: {}", presale.trim()));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice() -> SurgeNotice {
        SurgeNotice {
            artist_key: "Japanese Breakfast".into(),
            event_id: "ev1".into(),
            name: "Jubilee Tour".into(),
            event_time_local: Some("2025-09-12 20:00:00".into()),
            event_time_utc: None,
            venue: Some("The Anthem".into()),
            city: Some("Washington, DC".into()),
            url: Some("https://tickets.example/ev1".into()),
            presale_url: None,
            detected_at_ms: 0,
        }
    }

    #[test]
    fn render_includes_every_known_field() {
        assert_eq!(
            notice().render(),
            "🎫 New ticketing event for **Japanese Breakfast**\n\
             Jubilee Tour\n\
             🗓️ 2025-09-12 20:00:00\n\
             📍 The Anthem, Washington, DC\n\
             https://tickets.example/ev1"
        );
    }

    #[test]
    fn render_skips_missing_parts() {
        let n = SurgeNotice {
            name: " ".into(),
            event_time_local: None,
            venue: None,
            url: None,
            ..notice()
        };
        assert_eq!(
            n.render(),
            "🎫 New ticketing event for **Japanese Breakfast**\nNew event\n📍 Washington, DC"
        );
    }

    #[test]
    fn config_floors() {
        let cfg = SchedulerConfig {
            poll_interval: Duration::from_secs(5),
            request_spacing: Duration::ZERO,
            ..SchedulerConfig::default()
        }
        .normalized();

        assert_eq!(cfg.poll_interval, MIN_POLL_INTERVAL);
        assert_eq!(cfg.request_spacing, MIN_REQUEST_SPACING);
    }
}
