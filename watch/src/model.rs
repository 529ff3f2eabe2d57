use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A time-bounded subscription to new-event notifications for one artist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurgeWatch {
    pub artist_key: String,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
}

impl SurgeWatch {
    /// A watch stays active up to, but not including, its expiry instant.
    pub fn is_active(&self, now_ms: u64) -> bool {
        self.expires_at_ms > now_ms
    }
}

/// One upcoming event as returned by the ticketing source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<String>,
    pub artist_key: String,
    pub name: String,
    pub venue: Option<String>,
    pub city: Option<String>,
    /// Local date, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Local time, `HH:MM[:SS]`.
    pub time: Option<String>,
    pub url: Option<String>,
    pub presale_url: Option<String>,
    pub capacity: Option<u32>,
}

impl Event {
    /// Stable identity for deduplication.
    ///
    /// The upstream id when present; otherwise a SHA-256 over name and url,
    /// so the same listing re-fetched later maps to the same key.
    pub fn dedup_key(&self) -> String {
        if let Some(id) = self.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return id.to_string();
        }

        let mut hasher = Sha256::new();
        hasher.update(self.name.trim().as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.url.as_deref().unwrap_or("").trim().as_bytes());
        let digest = hasher.finalize();

        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("h:{hex}")
    }

    /// `(local, utc)` display strings.
    ///
    /// Local is `"date time"` (or just the date); UTC is only produced when
    /// both parts parse, treating the wall-clock value as UTC.
    pub fn format_event_time(&self) -> (Option<String>, Option<String>) {
        let date = self.date.as_deref().map(str::trim).unwrap_or("");
        let time = self.time.as_deref().map(str::trim).unwrap_or("");

        if date.is_empty() {
            return (None, None);
        }
        if time.is_empty() {
            return (Some(date.to_string()), None);
        }

        let local = format!("{date} {time}");
        let utc = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&local, fmt).ok())
            .map(|dt| dt.and_utc().to_rfc3339());

        (Some(local), utc)
    }
}

/// Ledger row: the first time an event was seen for an artist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenEventRecord {
    pub artist_key: String,
    pub event_id: String,
    pub name: String,
    pub event_time_local: Option<String>,
    pub event_time_utc: Option<String>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub url: Option<String>,
    pub first_seen_ms: u64,
}

impl SeenEventRecord {
    pub fn from_event(artist_key: &str, event: &Event, now_ms: u64) -> Self {
        let (event_time_local, event_time_utc) = event.format_event_time();
        Self {
            artist_key: artist_key.to_string(),
            event_id: event.dedup_key(),
            name: event.name.clone(),
            event_time_local,
            event_time_utc,
            venue: event.venue.clone(),
            city: event.city.clone(),
            url: event.url.clone(),
            first_seen_ms: now_ms,
        }
    }
}

/// Running count of new events observed for an artist in a city.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitySighting {
    pub artist_key: String,
    pub city: String,
    pub count: u32,
    pub last_seen_ms: u64,
}

/// Trims and collapses internal whitespace. `None` for blank input.
pub fn normalize_artist_key(raw: &str) -> Option<String> {
    let key = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!key.is_empty()).then_some(key)
}
