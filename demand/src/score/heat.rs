//! Market heat: a 0..100 proxy for ticket-buying demand for an artist in a
//! given city / venue context.

use serde::{Deserialize, Serialize};

use super::clamp_score;
use crate::types::{StreamingMetrics, VideoMetrics};

const STRONG_LISTENERS: u64 = 5_000_000;
const SOLID_LISTENERS: u64 = 1_000_000;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatContext {
    pub city: Option<String>,
    pub country: Option<String>,
    pub venue: Option<String>,
    pub streaming: Option<StreamingMetrics>,
    pub video: Option<VideoMetrics>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketHeat {
    pub score: f64,
    pub reasons: Vec<String>,
}

impl MarketHeat {
    /// Blends an external per-city weight (0..100, e.g. from a demand
    /// heatmap) into the score: 70% heat, 30% city weight.
    pub fn blend_city_weight(mut self, city_weight: f64) -> Self {
        let weight = clamp_score(city_weight);
        self.score = clamp_score(0.70 * self.score + 0.30 * weight);
        self.reasons.push(format!("City weight {weight:.0}/100 blended"));
        self
    }
}

pub fn compute_market_heat(ctx: &HeatContext) -> MarketHeat {
    let mut reasons = Vec::new();
    let mut base = 0.0;

    if let Some(streaming) = &ctx.streaming {
        base += f64::from(streaming.popularity.min(100)) * 0.5;

        match streaming.monthly_listeners.unwrap_or(0) {
            n if n > STRONG_LISTENERS => {
                base += 15.0;
                reasons.push("Strong global monthly listeners".to_string());
            }
            n if n > SOLID_LISTENERS => {
                base += 8.0;
                reasons.push("Solid monthly listeners".to_string());
            }
            _ => {}
        }

        if let Some(city) = ctx.city.as_deref() {
            let in_top = streaming
                .top_cities
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case(city.trim()));
            if in_top {
                base += 10.0;
                reasons.push("City appears in streaming top-city data".to_string());
            }
        }
    }

    if let Some(video) = &ctx.video {
        let momentum = f64::from(video.momentum.min(100));
        base += momentum * 0.3;

        if momentum >= 80.0 {
            reasons.push("High recent video momentum".to_string());
        } else if momentum >= 50.0 {
            reasons.push("Moderate video momentum".to_string());
        }
    }

    if let Some(venue) = ctx.venue.as_deref().filter(|v| !v.trim().is_empty()) {
        reasons.push(format!("Venue: {venue}"));
    }
    if let Some(country) = ctx.country.as_deref().filter(|c| !c.trim().is_empty()) {
        reasons.push(format!("Country: {country}"));
    }

    if reasons.is_empty() {
        reasons.push("Limited data; baseline heat applied".to_string());
    }

    MarketHeat {
        score: clamp_score(base),
        reasons,
    }
}
