use std::str::FromStr;
use std::time::Duration;

use demand::LabelBands;
use scheduler::SchedulerConfig;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Whether logs are emitted as JSON (`APP_ENV=production`).
    pub json_logs: bool,

    // =========================
    // Surge watch configuration
    // =========================
    /// Delay between two scheduler cycles. Floored at 60 s.
    pub poll_interval: Duration,

    /// Maximum number of concurrently active watches.
    ///
    /// Adding a new artist beyond this is rejected; nothing is evicted.
    pub max_surge_artists: usize,

    /// Watch duration used when `watch add` is given no `--days`.
    pub default_watch_days: u32,

    /// Minimum gap between two upstream requests, across all artists.
    /// Floored at 1 s.
    pub request_spacing: Duration,

    /// Upper bound of the random delay added before every request.
    ///
    /// Spreads requests so that a fleet restart does not hit the upstream
    /// in lockstep.
    pub max_jitter: Duration,

    // =========================
    // Ticketing source
    // =========================
    pub ticketing_api_url: String,

    /// Missing key means degraded mode: the source reports no events and
    /// says so once in the log.
    pub ticketing_api_key: Option<String>,

    /// Page size requested per artist fetch.
    pub events_per_fetch: u32,

    /// Chat webhook for notices. Missing means notices are only logged.
    pub webhook_url: Option<String>,

    // =========================
    // Report cache
    // =========================
    /// Upper bound on entries per cache.
    pub cache_capacity: usize,

    /// TTL for artist metric snapshots and composite scores.
    pub profile_cache_ttl: Duration,

    /// TTL for market heat and city rankings.
    pub city_cache_ttl: Duration,

    /// Label band table for composite scores.
    pub label_bands: LabelBands,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get("DATABASE_URL").unwrap_or_else(|| "sqlite://surge_watch.db".to_string());
        let json_logs = get("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"));

        let poll_secs: u64 = parse_or(&get, "TM_SURGE_POLL_SECONDS", 1_800)?;
        let spacing_ms: u64 = parse_or(&get, "SURGE_REQUEST_SPACING_MS", 1_000)?;
        let jitter_ms: u64 = parse_or(&get, "SURGE_MAX_JITTER_MS", 3_000)?;

        let label_bands = match get("DEMAND_LABEL_BANDS") {
            Some(v) => LabelBands::from_str(&v).map_err(|e| AppError::Config {
                key: "DEMAND_LABEL_BANDS",
                reason: e.to_string(),
            })?,
            None => LabelBands::canonical(),
        };

        Ok(Self {
            database_url,
            json_logs,

            poll_interval: Duration::from_secs(poll_secs.max(60)),
            max_surge_artists: parse_or::<usize>(&get, "MAX_SURGE_ARTISTS", 10)?.max(1),
            default_watch_days: parse_or::<u32>(&get, "SURGE_DEFAULT_DAYS", 5)?.max(1),
            request_spacing: Duration::from_millis(spacing_ms.max(1_000)),
            max_jitter: Duration::from_millis(jitter_ms),

            ticketing_api_url: get("TICKETING_API_URL")
                .unwrap_or_else(|| "https://app.ticketmaster.com/discovery/v2".to_string()),
            ticketing_api_key: get("TICKETMASTER_API_KEY"),
            events_per_fetch: parse_or::<u32>(&get, "SURGE_EVENTS_PER_FETCH", 25)?.clamp(1, 200),
            webhook_url: get("TOUR_SCAN_WEBHOOK_URL"),

            cache_capacity: parse_or::<usize>(&get, "CACHE_CAPACITY", 512)?.max(1),
            profile_cache_ttl: Duration::from_secs(parse_or(&get, "PROFILE_CACHE_TTL_SECS", 3_600)?),
            city_cache_ttl: Duration::from_secs(parse_or(&get, "CITY_CACHE_TTL_SECS", 1_800)?),
            label_bands,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval,
            request_spacing: self.request_spacing,
            max_jitter: self.max_jitter,
            ..SchedulerConfig::default()
        }
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| AppError::Config {
            key,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}
