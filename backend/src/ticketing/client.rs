use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use scheduler::{EventSource, FetchError};
use tracing::{debug, instrument, warn};
use watch::model::Event;

use crate::config::AppConfig;
use crate::ticketing::errors::TicketingError;
use crate::ticketing::types::EventsEnvelope;

#[derive(Clone)]
pub struct TicketingClient {
    http: Client,
    url: String,
    api_key: Option<String>,
    page_size: u32,
    degraded_announced: Arc<AtomicBool>,
}

impl TicketingClient {
    pub fn new(url: String, api_key: Option<String>, page_size: u32) -> Result<Self, TicketingError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            api_key,
            page_size,
            degraded_announced: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, TicketingError> {
        Self::new(
            cfg.ticketing_api_url.clone(),
            cfg.ticketing_api_key.clone(),
            cfg.events_per_fetch,
        )
    }

    /// No credential configured: every search yields no events.
    pub fn is_degraded(&self) -> bool {
        self.api_key.is_none()
    }

    #[instrument(skip(self), fields(artist = %artist_key), level = "debug")]
    pub async fn search_events(&self, artist_key: &str) -> Result<Vec<Event>, TicketingError> {
        let Some(api_key) = self.api_key.as_deref() else {
            if !self.degraded_announced.swap(true, Ordering::Relaxed) {
                warn!("ticketing api key not configured; event polling is degraded");
            }
            return Ok(Vec::new());
        };

        let url = format!("{}/events.json", self.url);
        let size = self.page_size.to_string();

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("apikey", api_key),
                ("keyword", artist_key),
                ("classificationName", "music"),
                ("sort", "date,asc"),
                ("size", size.as_str()),
            ])
            .send()
            .await?;

        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        check_status(resp.status(), retry_after.as_deref())?;

        let body = resp.text().await?;
        let events = parse_events(artist_key, &body)?;

        debug!(count = events.len(), "ticketing events fetched");
        Ok(events)
    }
}

#[async_trait]
impl EventSource for TicketingClient {
    async fn fetch_events(&self, artist_key: &str) -> Result<Vec<Event>, FetchError> {
        self.search_events(artist_key).await.map_err(FetchError::from)
    }
}

/// Maps a non-success status to an error. 429 carries the Retry-After hint.
pub fn check_status(status: StatusCode, retry_after: Option<&str>) -> Result<(), TicketingError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TicketingError::RateLimited {
            retry_after: retry_after.and_then(parse_retry_after),
        });
    }
    if !status.is_success() {
        return Err(TicketingError::Status(status.as_u16()));
    }
    Ok(())
}

/// Delta-seconds form only; HTTP-date values are ignored.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Decodes an events page. A body without `_embedded` means no events.
pub fn parse_events(artist_key: &str, body: &str) -> Result<Vec<Event>, TicketingError> {
    let envelope: EventsEnvelope = serde_json::from_str(body)?;

    Ok(envelope
        .embedded
        .map(|e| e.events)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|e| e.into_event(artist_key))
        .collect())
}
