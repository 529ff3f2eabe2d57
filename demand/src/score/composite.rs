//! Composite Scorer
//!
//! Combines normalized per-provider signals into a single 0..100 artist
//! strength score plus a label band.
//!
//! Sub-scores (each 0..100):
//! - streaming: 70% popularity index, 30% normalized followers
//! - video:     65% normalized subscribers, 35% momentum index
//! - social:    75% normalized hashtag views, 25% weekly growth
//!
//! Provider weights are 50/25/25. A provider with no data is dropped and the
//! remaining weights are renormalized, so an artist absent from a fallback
//! platform is not dragged towards zero.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{clamp_score, round2};
use crate::signal::{
    FOLLOWERS_CEILING, HASHTAG_VIEWS_CEILING, SUBSCRIBERS_CEILING, normalize_count,
};
use crate::types::{
    ArtistMetricSnapshot, Provider, SocialMetrics, StreamingMetrics, VideoMetrics, group_thousands,
};

const STREAMING_WEIGHT: f64 = 0.50;
const VIDEO_WEIGHT: f64 = 0.25;
const SOCIAL_WEIGHT: f64 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Emerging,
    Growing,
    Hot,
    Headliner,
    Rockstar,
}

impl Label {
    /// 1..=5 star rating, one star per band.
    pub fn stars(self) -> u8 {
        self as u8 + 1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Emerging => "Emerging",
            Label::Growing => "Growing",
            Label::Hot => "Hot",
            Label::Headliner => "Headliner",
            Label::Rockstar => "Rockstar",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bounds (inclusive) of the four upper label bands.
///
/// Anything below `growing` is `Emerging`, anything at or above `rockstar`
/// is `Rockstar`, so the bands partition the whole 0..=100 range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelBands {
    pub growing: f64,
    pub hot: f64,
    pub headliner: f64,
    pub rockstar: f64,
}

impl LabelBands {
    /// 25 / 45 / 65 / 85.
    pub const fn canonical() -> Self {
        Self {
            growing: 25.0,
            hot: 45.0,
            headliner: 65.0,
            rockstar: 85.0,
        }
    }

    /// 30 / 50 / 65 / 80. Kept selectable until the band table is settled.
    pub const fn conservative() -> Self {
        Self {
            growing: 30.0,
            hot: 50.0,
            headliner: 65.0,
            rockstar: 80.0,
        }
    }

    pub fn label_for(&self, value: f64) -> Label {
        if value >= self.rockstar {
            Label::Rockstar
        } else if value >= self.headliner {
            Label::Headliner
        } else if value >= self.hot {
            Label::Hot
        } else if value >= self.growing {
            Label::Growing
        } else {
            Label::Emerging
        }
    }

    /// Bounds must be strictly increasing inside `(0, 100]`.
    pub fn is_well_formed(&self) -> bool {
        0.0 < self.growing
            && self.growing < self.hot
            && self.hot < self.headliner
            && self.headliner < self.rockstar
            && self.rockstar <= 100.0
    }
}

impl Default for LabelBands {
    fn default() -> Self {
        Self::canonical()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown label band table '{0}' (expected 'canonical' or 'conservative')")]
pub struct UnknownBands(pub String);

impl FromStr for LabelBands {
    type Err = UnknownBands;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "canonical" | "" => Ok(Self::canonical()),
            "conservative" => Ok(Self::conservative()),
            other => Err(UnknownBands(other.to_string())),
        }
    }
}

/// Result of scoring one snapshot. Always recomputable, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompositeScore {
    /// 0..=100.
    pub value: f64,
    pub label: Label,
    pub stars: u8,
    /// Weighted contribution of each present provider; sums to `value`
    /// (before clamping).
    pub breakdown: BTreeMap<Provider, f64>,
    /// Providers explicitly marked absent.
    pub missing: Vec<Provider>,
    pub reasons: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CompositeScorer {
    bands: LabelBands,
}

impl CompositeScorer {
    pub fn new(bands: LabelBands) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> LabelBands {
        self.bands
    }

    pub fn score(&self, snapshot: &ArtistMetricSnapshot) -> CompositeScore {
        let mut reasons = Vec::new();
        let mut present: Vec<(Provider, f64, f64)> = Vec::with_capacity(3);

        if let Some(m) = &snapshot.streaming {
            present.push((Provider::Streaming, STREAMING_WEIGHT, streaming_subscore(m)));
            reasons.push(format!("Streaming popularity {}/100", m.popularity.min(100)));
            if m.followers > 0 {
                reasons.push(format!("Streaming followers {}", group_thousands(m.followers)));
            }
        }

        if let Some(m) = &snapshot.video {
            present.push((Provider::Video, VIDEO_WEIGHT, video_subscore(m)));
            if m.subscribers > 0 {
                reasons.push(format!("Video subscribers {}", group_thousands(m.subscribers)));
            }
            reasons.push(format!("Video momentum {}/100", m.momentum.min(100)));
        }

        if let Some(m) = &snapshot.social {
            present.push((Provider::Social, SOCIAL_WEIGHT, social_subscore(m)));
            if m.hashtag_views > 0 {
                reasons.push(format!(
                    "Social hashtag views {}",
                    group_thousands(m.hashtag_views)
                ));
            }
            if m.weekly_growth_pct > 0.0 {
                reasons.push(format!("Social weekly growth {:.0}%", m.weekly_growth_pct));
            }
        }

        let missing = snapshot.missing();
        for p in &missing {
            reasons.push(format!("No {p} data (excluded from weighting)"));
        }

        let total_weight: f64 = present.iter().map(|(_, w, _)| w).sum();

        let mut breakdown = BTreeMap::new();
        let mut value = 0.0;
        if total_weight > 0.0 {
            for (provider, weight, sub) in &present {
                let contribution = weight / total_weight * sub;
                breakdown.insert(*provider, round2(contribution));
                value += contribution;
            }
        }

        let value = clamp_score(value);
        let label = self.bands.label_for(value);

        CompositeScore {
            value,
            label,
            stars: label.stars(),
            breakdown,
            missing,
            reasons,
        }
    }
}

pub fn streaming_subscore(m: &StreamingMetrics) -> f64 {
    let popularity = f64::from(m.popularity.min(100));
    0.70 * popularity + 0.30 * normalize_count(m.followers, FOLLOWERS_CEILING)
}

pub fn video_subscore(m: &VideoMetrics) -> f64 {
    let momentum = f64::from(m.momentum.min(100));
    0.65 * normalize_count(m.subscribers, SUBSCRIBERS_CEILING) + 0.35 * momentum
}

pub fn social_subscore(m: &SocialMetrics) -> f64 {
    let growth = clamp_score(m.weekly_growth_pct);
    0.75 * normalize_count(m.hashtag_views, HASHTAG_VIEWS_CEILING) + 0.25 * growth
}
