use std::collections::HashMap;

use async_trait::async_trait;
use demand::{ArtistMetricSnapshot, Provider, ProviderMetrics};

use crate::cache::normalize_key;

/// One upstream metrics source.
///
/// Absence is not an error: a provider that has nothing for the artist, is
/// unconfigured or is down returns `None`, and the composite excludes it.
#[async_trait]
pub trait ArtistMetricsProvider: Send + Sync {
    fn provider(&self) -> Provider;

    async fn fetch(&self, artist_key: &str) -> Option<ProviderMetrics>;
}

/// Serves metrics from snapshots loaded up front (e.g. from a JSON file).
pub struct StaticMetricsProvider {
    provider: Provider,
    by_artist: HashMap<String, ProviderMetrics>,
}

impl StaticMetricsProvider {
    /// One provider per kind, each holding that kind's part of every snapshot.
    pub fn from_snapshots(snapshots: &[ArtistMetricSnapshot]) -> Vec<Self> {
        Provider::ALL
            .into_iter()
            .map(|provider| {
                let by_artist = snapshots
                    .iter()
                    .filter_map(|s| part(s, provider).map(|m| (normalize_key(&s.artist_key), m)))
                    .collect();
                Self { provider, by_artist }
            })
            .collect()
    }
}

fn part(snapshot: &ArtistMetricSnapshot, provider: Provider) -> Option<ProviderMetrics> {
    match provider {
        Provider::Streaming => snapshot.streaming.clone().map(ProviderMetrics::Streaming),
        Provider::Video => snapshot.video.clone().map(ProviderMetrics::Video),
        Provider::Social => snapshot.social.clone().map(ProviderMetrics::Social),
    }
}

#[async_trait]
impl ArtistMetricsProvider for StaticMetricsProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch(&self, artist_key: &str) -> Option<ProviderMetrics> {
        self.by_artist.get(&normalize_key(artist_key)).cloned()
    }
}
