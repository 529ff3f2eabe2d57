use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use common::time::now_ms;
use demand::score::composite::social_subscore;
use demand::{
    ArtistMetricSnapshot, ArtistStrength, CityHistory, CityRank, CityRanker, CitySources,
    CompositeScore, CompositeScorer, HeatContext, MarketHeat, SelloutEstimate, SelloutSignals,
    compute_market_heat, sellout_probability,
};
use futures::future::join_all;
use scheduler::EventSource;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use watch::model::{Event, normalize_artist_key};
use watch::store::SightingStore;

use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::report::provider::ArtistMetricsProvider;

const DEFAULT_CITY_LIMIT: usize = 10;

/// Everything known about one artist's demand at one point in time.
#[derive(Clone, Debug, Serialize)]
pub struct ArtistReport {
    pub artist_key: String,
    pub snapshot: ArtistMetricSnapshot,
    pub score: CompositeScore,
    /// Heat in the top-ranked city.
    pub heat: MarketHeat,
    pub cities: Vec<CityRank>,
    pub generated_at_ms: u64,
}

/// Assembles artist reports from metric providers, sighting history and live
/// ticketing density.
///
/// Best effort throughout: an unavailable provider, history store or event
/// source only removes its contribution. Snapshots and composite scores are
/// cached for the profile TTL; heat and city rankings for the city TTL.
pub struct ReportService {
    providers: Vec<Arc<dyn ArtistMetricsProvider>>,
    scorer: CompositeScorer,
    ranker: CityRanker,
    sightings: Option<Arc<dyn SightingStore>>,
    live_events: Option<Arc<dyn EventSource>>,
    boosts: BTreeMap<String, f64>,
    city_weights: BTreeMap<String, f64>,
    city_limit: usize,

    profile_ttl: Duration,
    city_ttl: Duration,
    snapshots: TtlCache<ArtistMetricSnapshot>,
    scores: TtlCache<CompositeScore>,
    heat: TtlCache<MarketHeat>,
    cities: TtlCache<Vec<CityRank>>,
}

impl ReportService {
    pub fn new(
        scorer: CompositeScorer,
        profile_ttl: Duration,
        city_ttl: Duration,
        cache_capacity: usize,
    ) -> Self {
        Self {
            providers: Vec::new(),
            scorer,
            ranker: CityRanker::default(),
            sightings: None,
            live_events: None,
            boosts: BTreeMap::new(),
            city_weights: BTreeMap::new(),
            city_limit: DEFAULT_CITY_LIMIT,

            profile_ttl,
            city_ttl,
            snapshots: TtlCache::new("snapshots", cache_capacity),
            scores: TtlCache::new("scores", cache_capacity),
            heat: TtlCache::new("heat", cache_capacity),
            cities: TtlCache::new("cities", cache_capacity),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            CompositeScorer::new(cfg.label_bands),
            cfg.profile_cache_ttl,
            cfg.city_cache_ttl,
            cfg.cache_capacity,
        )
    }

    pub fn with_provider(mut self, provider: Arc<dyn ArtistMetricsProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_sightings(mut self, sightings: Arc<dyn SightingStore>) -> Self {
        self.sightings = Some(sightings);
        self
    }

    pub fn with_live_events(mut self, source: Arc<dyn EventSource>) -> Self {
        self.live_events = Some(source);
        self
    }

    /// Manual per-city boosts, keyed case-insensitively by city.
    pub fn with_boosts(mut self, boosts: BTreeMap<String, f64>) -> Self {
        self.boosts = boosts;
        self
    }

    /// External 0..100 demand weights per city (e.g. a regional heatmap),
    /// blended into market heat wherever the city is known.
    pub fn with_city_weights(mut self, weights: BTreeMap<String, f64>) -> Self {
        self.city_weights = weights;
        self
    }

    fn city_weight(&self, city: &str) -> Option<f64> {
        let city = city.trim();
        self.city_weights
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(city))
            .map(|(_, w)| *w)
            .filter(|w| w.is_finite())
    }

    /// Heat for `city`, blended with its external weight when one is known.
    fn weighted_heat(&self, heat: MarketHeat, city: Option<&str>) -> MarketHeat {
        match city.and_then(|c| self.city_weight(c)) {
            Some(weight) => heat.blend_city_weight(weight),
            None => heat,
        }
    }

    pub fn with_city_limit(mut self, limit: usize) -> Self {
        self.city_limit = limit.max(1);
        self
    }

    pub fn score_artist(&self, snapshot: &ArtistMetricSnapshot) -> CompositeScore {
        self.scorer.score(snapshot)
    }

    pub fn rank_cities(&self, artist_key: &str, sources: &CitySources, limit: usize) -> Vec<CityRank> {
        self.ranker.rank(artist_key, sources, limit)
    }

    /// Sellout estimate for one event; capacity and days-until-event are
    /// taken from the event when the caller leaves them unset, and the
    /// event city's weight is blended into the supplied heat.
    pub fn sellout_probability(&self, event: &Event, signals: SelloutSignals) -> SelloutEstimate {
        let today = Utc::now().date_naive();
        let mut signals = signals_for_event(event, signals, today);

        let heat = self.weighted_heat(
            MarketHeat {
                score: signals.market_heat,
                reasons: Vec::new(),
            },
            event.city.as_deref(),
        );
        signals.market_heat = heat.score;

        let mut estimate = sellout_probability(&signals);
        estimate.reasons.splice(0..0, heat.reasons);
        estimate
    }

    pub async fn artist_report(&self, artist: &str) -> Result<ArtistReport, AppError> {
        self.artist_report_at(artist, now_ms()).await
    }

    /// Fails only when the artist key is empty after normalization.
    #[instrument(skip(self), fields(artist = %artist))]
    pub async fn artist_report_at(&self, artist: &str, now_ms: u64) -> Result<ArtistReport, AppError> {
        let artist_key = normalize_artist_key(artist).ok_or(AppError::InvalidArtist)?;

        let snapshot = self.snapshot(&artist_key, now_ms).await;

        let score = match self.scores.get(&artist_key, now_ms) {
            Some(score) => score,
            None => {
                let score = self.scorer.score(&snapshot);
                self.scores
                    .set(&artist_key, score.clone(), self.profile_ttl, now_ms);
                score
            }
        };

        let cities = match self.cities.get(&artist_key, now_ms) {
            Some(cities) => cities,
            None => {
                let sources = self.city_sources(&artist_key, &snapshot, now_ms).await;
                let cities = self.ranker.rank(&artist_key, &sources, self.city_limit);
                self.cities
                    .set(&artist_key, cities.clone(), self.city_ttl, now_ms);
                cities
            }
        };

        let heat = match self.heat.get(&artist_key, now_ms) {
            Some(heat) => heat,
            None => {
                let top_city = cities.first().map(|c| c.city.clone());
                let heat = compute_market_heat(&HeatContext {
                    city: top_city.clone(),
                    streaming: snapshot.streaming.clone(),
                    video: snapshot.video.clone(),
                    ..HeatContext::default()
                });
                let heat = self.weighted_heat(heat, top_city.as_deref());
                self.heat.set(&artist_key, heat.clone(), self.city_ttl, now_ms);
                heat
            }
        };

        debug!(
            score = score.value,
            heat = heat.score,
            cities = cities.len(),
            "artist report assembled"
        );

        Ok(ArtistReport {
            artist_key,
            snapshot,
            score,
            heat,
            cities,
            generated_at_ms: now_ms,
        })
    }

    async fn snapshot(&self, artist_key: &str, now_ms: u64) -> ArtistMetricSnapshot {
        if let Some(snapshot) = self.snapshots.get(artist_key, now_ms) {
            debug!("snapshot cache hit");
            return snapshot;
        }

        let fetched = join_all(self.providers.iter().map(|p| p.fetch(artist_key))).await;

        let parts = self
            .providers
            .iter()
            .zip(fetched)
            .filter_map(|(provider, part)| {
                let part = part?;
                if part.provider() != provider.provider() {
                    warn!(
                        expected = %provider.provider(),
                        got = %part.provider(),
                        "provider returned metrics of another kind; ignored"
                    );
                    return None;
                }
                Some(part)
            })
            .collect::<Vec<_>>();

        let snapshot = ArtistMetricSnapshot::from_parts(artist_key, parts, now_ms);
        debug!(missing = ?snapshot.missing(), "snapshot assembled");

        self.snapshots
            .set(artist_key, snapshot.clone(), self.profile_ttl, now_ms);
        snapshot
    }

    async fn city_sources(
        &self,
        artist_key: &str,
        snapshot: &ArtistMetricSnapshot,
        now_ms: u64,
    ) -> CitySources {
        let live_counts = match &self.live_events {
            Some(source) => match source.fetch_events(artist_key).await {
                Ok(events) => count_by_city(&events),
                Err(e) => {
                    warn!(error = %e, "live ticketing density unavailable");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let history = match &self.sightings {
            Some(store) => match store.sightings_for(artist_key).await {
                Ok(rows) => rows
                    .into_iter()
                    .map(|s| CityHistory {
                        city: s.city,
                        count: s.count,
                        last_seen_ms: Some(s.last_seen_ms),
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "city sighting history unavailable");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let streaming = snapshot.streaming.as_ref();

        CitySources {
            live_counts,
            history,
            seed_cities: streaming.map(|s| s.top_cities.clone()).unwrap_or_default(),
            strength: ArtistStrength {
                followers: streaming.map(|s| s.followers),
                monthly_listeners: streaming.and_then(|s| s.monthly_listeners),
                subscribers: snapshot.video.as_ref().map(|v| v.subscribers),
            },
            social_heat: snapshot.social.as_ref().map(|m| social_subscore(m) / 100.0),
            boosts: self.boosts.clone(),
            now_ms,
        }
    }
}

/// Event counts per city in first-seen order; spellings merge case-insensitively.
fn count_by_city(events: &[Event]) -> Vec<(String, u32)> {
    let mut counts: Vec<(String, u32)> = Vec::new();

    for city in events
        .iter()
        .filter_map(|e| e.city.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        match counts.iter().position(|(c, _)| c.eq_ignore_ascii_case(city)) {
            Some(i) => counts[i].1 += 1,
            None => counts.push((city.to_string(), 1)),
        }
    }

    counts
}

/// Fills the event-derived sellout inputs the caller did not supply.
pub fn signals_for_event(event: &Event, mut signals: SelloutSignals, today: NaiveDate) -> SelloutSignals {
    if signals.venue_capacity.is_none() {
        signals.venue_capacity = event.capacity;
    }

    if signals.days_until_event.is_none() {
        signals.days_until_event = event
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
            .map(|d| (d - today).num_days());
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(city: Option<&str>) -> Event {
        Event {
            name: "show".into(),
            city: city.map(str::to_string),
            ..Event::default()
        }
    }

    #[test]
    fn city_counts_merge_spellings() {
        let events = [
            event(Some("Chicago, IL")),
            event(Some("Austin, TX")),
            event(Some("chicago, il ")),
            event(None),
            event(Some("  ")),
        ];

        assert_eq!(
            count_by_city(&events),
            vec![("Chicago, IL".to_string(), 2), ("Austin, TX".to_string(), 1)]
        );
    }

    #[test]
    fn event_fills_missing_signals_only() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        let ev = Event {
            date: Some("2025-11-11".into()),
            capacity: Some(2_500),
            ..event(None)
        };

        let filled = signals_for_event(&ev, SelloutSignals::default(), today);
        assert_eq!(filled.venue_capacity, Some(2_500));
        assert_eq!(filled.days_until_event, Some(10));

        let explicit = SelloutSignals {
            venue_capacity: Some(20_000),
            days_until_event: Some(90),
            ..SelloutSignals::default()
        };
        let kept = signals_for_event(&ev, explicit, today);
        assert_eq!(kept.venue_capacity, Some(20_000));
        assert_eq!(kept.days_until_event, Some(90));
    }

    #[test]
    fn unparseable_event_date_leaves_timing_unset() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        let ev = Event {
            date: Some("TBA".into()),
            ..event(None)
        };

        assert_eq!(
            signals_for_event(&ev, SelloutSignals::default(), today).days_until_event,
            None
        );
    }
}
