//! City Ranker
//!
//! Ranks candidate cities for one artist from live ticketing density,
//! historical sightings, artist audience strength, social heat and manual
//! boosts. When nothing is known about the artist, falls back to a seed list
//! with strictly decreasing synthetic weights.

use std::collections::BTreeMap;

use common::time::DAY_MS;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::round2;
use crate::signal::{count_scale, log_scale};

/// Major touring markets used when the caller supplies no seeds.
pub const DEFAULT_SEED_CITIES: [&str; 12] = [
    "New York, NY",
    "Los Angeles, CA",
    "Chicago, IL",
    "Toronto, ON",
    "Atlanta, GA",
    "Dallas, TX",
    "Houston, TX",
    "Boston, MA",
    "Philadelphia, PA",
    "Seattle, WA",
    "San Francisco, CA",
    "Nashville, TN",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CityHistory {
    pub city: String,
    pub count: u32,
    #[serde(default)]
    pub last_seen_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistStrength {
    pub followers: Option<u64>,
    pub monthly_listeners: Option<u64>,
    pub subscribers: Option<u64>,
}

impl ArtistStrength {
    /// 0..=10 blend of log-scaled audience sizes.
    pub fn index(&self) -> f64 {
        0.35 * log_scale(self.followers, 10.0)
            + 0.35 * log_scale(self.monthly_listeners, 10.0)
            + 0.30 * log_scale(self.subscribers, 10.0)
    }
}

/// Everything the ranker knows about one artist's markets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CitySources {
    /// Upcoming events per city from the ticketing source.
    #[serde(default)]
    pub live_counts: Vec<(String, u32)>,
    /// Past sightings per city.
    #[serde(default)]
    pub history: Vec<CityHistory>,
    /// Cold-start list, in priority order. Empty means [`DEFAULT_SEED_CITIES`].
    #[serde(default)]
    pub seed_cities: Vec<String>,
    #[serde(default)]
    pub strength: ArtistStrength,
    /// 0..1; out-of-range values are clamped.
    #[serde(default)]
    pub social_heat: Option<f64>,
    /// Manual per-city boosts, matched case-insensitively.
    #[serde(default)]
    pub boosts: BTreeMap<String, f64>,
    pub now_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CityRank {
    pub city: String,
    pub score: f64,
    pub components: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CityRanker {
    pub live_weight: f64,
    pub live_cap: f64,
    pub history_weight: f64,
    pub history_cap: f64,
    pub recency_bonus: f64,
    pub recency_window_days: u64,
    pub strength_weight: f64,
    pub social_multiplier: f64,
}

impl Default for CityRanker {
    fn default() -> Self {
        Self {
            live_weight: 0.45,
            live_cap: 12.0,
            history_weight: 0.35,
            history_cap: 10.0,
            recency_bonus: 1.5,
            recency_window_days: 60,
            strength_weight: 0.20,
            social_multiplier: 4.0,
        }
    }
}

#[derive(Default)]
struct Candidate {
    city: String,
    live: u32,
    history: u32,
    last_seen_ms: Option<u64>,
}

impl CityRanker {
    pub fn rank(&self, artist_key: &str, sources: &CitySources, limit: usize) -> Vec<CityRank> {
        let limit = limit.max(1);
        let candidates = collect_candidates(sources);

        let has_signal = candidates.iter().any(|c| c.live > 0 || c.history > 0);
        if !has_signal {
            debug!(artist = %artist_key, "no city signal; using seed list");
            return seed_ranking(&sources.seed_cities, limit);
        }

        let strength = self.strength_weight * sources.strength.index();
        let social = sources
            .social_heat
            .filter(|h| h.is_finite())
            .map(|h| h.clamp(0.0, 1.0) * self.social_multiplier)
            .unwrap_or(0.0);

        let mut ranked: Vec<CityRank> = candidates
            .into_iter()
            .map(|c| {
                let mut components = BTreeMap::new();
                components.insert(
                    "live".to_string(),
                    self.live_weight * count_scale(c.live, self.live_cap),
                );
                components.insert(
                    "history".to_string(),
                    self.history_weight * count_scale(c.history, self.history_cap),
                );
                if self.is_recent(c.last_seen_ms, sources.now_ms) {
                    components.insert("recency".to_string(), self.recency_bonus);
                }
                if strength > 0.0 {
                    components.insert("strength".to_string(), strength);
                }
                if social > 0.0 {
                    components.insert("social".to_string(), social);
                }
                if let Some(boost) = lookup_boost(&sources.boosts, &c.city) {
                    components.insert("boost".to_string(), boost);
                }

                let score = round2(components.values().sum());
                CityRank {
                    city: c.city,
                    score,
                    components,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.city.cmp(&b.city))
        });
        ranked.truncate(limit);

        debug!(artist = %artist_key, returned = ranked.len(), "ranked cities");
        ranked
    }

    fn is_recent(&self, last_seen_ms: Option<u64>, now_ms: u64) -> bool {
        match last_seen_ms {
            Some(seen) => now_ms.saturating_sub(seen) <= self.recency_window_days * DAY_MS,
            None => false,
        }
    }
}

/// [`CityRanker::rank`] with the default weights.
pub fn rank_cities(artist_key: &str, sources: &CitySources, limit: usize) -> Vec<CityRank> {
    CityRanker::default().rank(artist_key, sources, limit)
}

/// Live cities first, then historical ones; duplicates merge into the first
/// spelling seen.
fn collect_candidates(sources: &CitySources) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    let mut slot = |city: &str, out: &mut Vec<Candidate>| -> Option<usize> {
        let trimmed = city.trim();
        if trimmed.is_empty() {
            return None;
        }
        let key = trimmed.to_lowercase();
        Some(*index.entry(key).or_insert_with(|| {
            out.push(Candidate {
                city: trimmed.to_string(),
                ..Candidate::default()
            });
            out.len() - 1
        }))
    };

    for (city, count) in &sources.live_counts {
        if let Some(i) = slot(city.as_str(), &mut out) {
            out[i].live = out[i].live.saturating_add(*count);
        }
    }
    for h in &sources.history {
        if let Some(i) = slot(h.city.as_str(), &mut out) {
            let c = &mut out[i];
            c.history = c.history.saturating_add(h.count);
            c.last_seen_ms = c.last_seen_ms.max(h.last_seen_ms);
        }
    }

    out
}

fn lookup_boost(boosts: &BTreeMap<String, f64>, city: &str) -> Option<f64> {
    boosts
        .iter()
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(city))
        .map(|(_, v)| *v)
        .filter(|v| v.is_finite() && *v != 0.0)
}

fn seed_ranking(seeds: &[String], limit: usize) -> Vec<CityRank> {
    let mut cities: Vec<String> = Vec::new();
    let mut push = |c: &str| {
        let c = c.trim();
        if !c.is_empty() && !cities.iter().any(|x| x.eq_ignore_ascii_case(c)) {
            cities.push(c.to_string());
        }
    };

    if seeds.iter().any(|s| !s.trim().is_empty()) {
        seeds.iter().for_each(|s| push(s.as_str()));
    } else {
        DEFAULT_SEED_CITIES.iter().for_each(|s| push(*s));
    }

    let n = cities.len();
    cities
        .into_iter()
        .enumerate()
        .take(limit)
        .map(|(i, city)| {
            let weight = (n - i) as f64;
            CityRank {
                city,
                score: weight,
                components: BTreeMap::from([("seed".to_string(), weight)]),
            }
        })
        .collect()
}
