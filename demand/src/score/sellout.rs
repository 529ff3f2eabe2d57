//! Sellout probability for a single event.
//!
//! `base = 0.45·heat + 0.35·popularity + 0.20·momentum`, then three
//! independent, additive, stepwise adjustments (venue size, inventory
//! pressure, time to event) and a final clamp to 0..100. Reasons are for
//! explainability only and never feed back into the value.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{clamp_score, round2};
use crate::types::group_thousands;

/// Inventory pressure multiplier around the neutral midpoint of 50.
const INVENTORY_SLOPE: f64 = 0.18;
const INVENTORY_MAX_ADJ: f64 = 9.0;

const NEAR_TERM_DAYS: i64 = 45;
const FAR_FUTURE_DAYS: i64 = 180;
const TIMING_NUDGE: f64 = 4.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelloutSignals {
    /// 0..100.
    pub market_heat: f64,
    /// Streaming popularity index, 0..100.
    pub popularity: f64,
    /// Video momentum index, 0..100.
    pub momentum: f64,
    #[serde(default)]
    pub venue_capacity: Option<u32>,
    /// 0..100, higher means more inventory already sold.
    #[serde(default)]
    pub inventory_pressure: Option<f64>,
    #[serde(default)]
    pub days_until_event: Option<i64>,
}

impl Default for SelloutSignals {
    fn default() -> Self {
        Self {
            market_heat: 50.0,
            popularity: 50.0,
            momentum: 50.0,
            venue_capacity: None,
            inventory_pressure: None,
            days_until_event: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SelloutOutlook {
    Low,
    Niche,
    Moderate,
    Strong,
    UltraHot,
}

impl SelloutOutlook {
    pub fn from_value(value: f64) -> Self {
        if value >= 85.0 {
            SelloutOutlook::UltraHot
        } else if value >= 70.0 {
            SelloutOutlook::Strong
        } else if value >= 55.0 {
            SelloutOutlook::Moderate
        } else if value >= 35.0 {
            SelloutOutlook::Niche
        } else {
            SelloutOutlook::Low
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            SelloutOutlook::UltraHot => "Likely to sell out quickly",
            SelloutOutlook::Strong => "High demand with good odds of a sellout",
            SelloutOutlook::Moderate => "Decent demand; may sell out",
            SelloutOutlook::Niche => "Localized demand; sellout uncertain",
            SelloutOutlook::Low => "Limited demand signals; sellout unlikely",
        }
    }
}

impl fmt::Display for SelloutOutlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelloutOutlook::UltraHot => "Ultra-hot",
            SelloutOutlook::Strong => "Strong",
            SelloutOutlook::Moderate => "Moderate",
            SelloutOutlook::Niche => "Niche",
            SelloutOutlook::Low => "Low",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelloutEstimate {
    /// 0..=100.
    pub value: f64,
    pub outlook: SelloutOutlook,
    pub reasons: Vec<String>,
}

impl SelloutEstimate {
    pub fn probability(&self) -> u8 {
        self.value.round() as u8
    }
}

/// Smaller rooms sell out more easily at the same demand.
pub fn venue_adjustment(capacity: Option<u32>) -> f64 {
    match capacity {
        None | Some(0) => 0.0,
        Some(c) if c <= 3_000 => 18.0,
        Some(c) if c <= 7_000 => 8.0,
        Some(c) if c <= 12_000 => 0.0,
        Some(c) if c <= 20_000 => -6.0,
        Some(_) => -10.0,
    }
}

pub fn inventory_adjustment(pressure: Option<f64>) -> f64 {
    match pressure {
        Some(p) if p.is_finite() => ((p - 50.0) * INVENTORY_SLOPE)
            .clamp(-INVENTORY_MAX_ADJ, INVENTORY_MAX_ADJ),
        _ => 0.0,
    }
}

/// Past or unknown dates get no nudge.
pub fn timing_adjustment(days_until: Option<i64>) -> f64 {
    match days_until {
        Some(d) if (0..=NEAR_TERM_DAYS).contains(&d) => TIMING_NUDGE,
        Some(d) if d > FAR_FUTURE_DAYS => -TIMING_NUDGE,
        _ => 0.0,
    }
}

pub fn sellout_probability(signals: &SelloutSignals) -> SelloutEstimate {
    let heat = clamp_score(signals.market_heat);
    let popularity = clamp_score(signals.popularity);
    let momentum = clamp_score(signals.momentum);

    let base = 0.45 * heat + 0.35 * popularity + 0.20 * momentum;

    let mut reasons = vec![
        format!("Market heat {heat:.0}/100"),
        format!("Popularity {popularity:.0}/100"),
        format!("Momentum {momentum:.0}/100"),
    ];

    let venue_adj = venue_adjustment(signals.venue_capacity);
    if let Some(cap) = signals.venue_capacity.filter(|c| *c > 0) {
        reasons.push(format!(
            "Venue capacity {} ({:+.0})",
            group_thousands(u64::from(cap)),
            venue_adj
        ));
    }

    let inventory_adj = inventory_adjustment(signals.inventory_pressure);
    if let Some(p) = signals.inventory_pressure.filter(|p| p.is_finite()) {
        reasons.push(format!(
            "Inventory pressure {p:.0}/100 ({:+.1})",
            round2(inventory_adj)
        ));
    }

    let timing_adj = timing_adjustment(signals.days_until_event);
    if let Some(days) = signals.days_until_event.filter(|_| timing_adj != 0.0) {
        reasons.push(format!("Event in {days} days ({timing_adj:+.0})"));
    }

    let value = clamp_score(base + venue_adj + inventory_adj + timing_adj);

    SelloutEstimate {
        value,
        outlook: SelloutOutlook::from_value(value),
        reasons,
    }
}
