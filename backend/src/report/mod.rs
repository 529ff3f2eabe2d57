pub mod provider;
pub mod service;

pub use provider::{ArtistMetricsProvider, StaticMetricsProvider};
pub use service::{ArtistReport, ReportService, signals_for_event};
