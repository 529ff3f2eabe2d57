//! Demand scoring for touring artists.
//!
//! Everything in this crate is pure and synchronous: raw provider metrics go
//! in, bounded 0..100 scores with human-readable reasons come out. Callers may
//! invoke any scorer concurrently without coordination.

pub mod score;
pub mod signal;
pub mod types;

pub use score::city::{ArtistStrength, CityHistory, CityRank, CityRanker, CitySources, rank_cities};
pub use score::composite::{CompositeScore, CompositeScorer, Label, LabelBands};
pub use score::heat::{HeatContext, MarketHeat, compute_market_heat};
pub use score::sellout::{SelloutEstimate, SelloutOutlook, SelloutSignals, sellout_probability};
pub use types::{ArtistMetricSnapshot, Provider, ProviderMetrics};
