use std::fmt;

use serde::{Deserialize, Serialize};

/// Upstream metric providers feeding the composite score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Music streaming platform (popularity index, followers).
    Streaming,
    /// Long-form video platform (subscribers, momentum).
    Video,
    /// Short-video / social platform (hashtag views, weekly growth).
    Social,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Streaming, Provider::Video, Provider::Social];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Streaming => "streaming",
            Provider::Video => "video",
            Provider::Social => "social",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingMetrics {
    /// Provider popularity index, 0..=100.
    pub popularity: u8,
    pub followers: u64,
    #[serde(default)]
    pub monthly_listeners: Option<u64>,
    /// Cities the provider reports as the artist's strongest markets.
    #[serde(default)]
    pub top_cities: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetrics {
    pub subscribers: u64,
    /// Recent momentum index, 0..=100.
    pub momentum: u8,
    #[serde(default)]
    pub recent_views: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialMetrics {
    pub hashtag_views: u64,
    pub weekly_growth_pct: f64,
}

/// One provider's contribution to a snapshot, as returned by a metrics fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderMetrics {
    Streaming(StreamingMetrics),
    Video(VideoMetrics),
    Social(SocialMetrics),
}

impl ProviderMetrics {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderMetrics::Streaming(_) => Provider::Streaming,
            ProviderMetrics::Video(_) => Provider::Video,
            ProviderMetrics::Social(_) => Provider::Social,
        }
    }
}

/// Raw per-provider metrics for one artist at one point in time.
///
/// Immutable once built: a refresh produces a new snapshot rather than
/// patching fields. `None` means the provider returned no data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistMetricSnapshot {
    pub artist_key: String,
    #[serde(default)]
    pub streaming: Option<StreamingMetrics>,
    #[serde(default)]
    pub video: Option<VideoMetrics>,
    #[serde(default)]
    pub social: Option<SocialMetrics>,
    #[serde(default)]
    pub fetched_at_ms: u64,
}

impl ArtistMetricSnapshot {
    /// Assembles a snapshot from whatever provider parts were fetched.
    /// A later part for the same provider replaces an earlier one.
    pub fn from_parts(
        artist_key: impl Into<String>,
        parts: impl IntoIterator<Item = ProviderMetrics>,
        fetched_at_ms: u64,
    ) -> Self {
        let mut snapshot = Self {
            artist_key: artist_key.into(),
            fetched_at_ms,
            ..Self::default()
        };

        for part in parts {
            match part {
                ProviderMetrics::Streaming(m) => snapshot.streaming = Some(m),
                ProviderMetrics::Video(m) => snapshot.video = Some(m),
                ProviderMetrics::Social(m) => snapshot.social = Some(m),
            }
        }

        snapshot
    }

    pub fn has(&self, provider: Provider) -> bool {
        match provider {
            Provider::Streaming => self.streaming.is_some(),
            Provider::Video => self.video.is_some(),
            Provider::Social => self.social.is_some(),
        }
    }

    /// Providers with no data in this snapshot, in canonical order.
    pub fn missing(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| !self.has(*p))
            .collect()
    }
}

/// Formats an integer with `,` thousands separators ("2,000,000").
pub(crate) fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_fills_only_fetched_providers() {
        let snap = ArtistMetricSnapshot::from_parts(
            "Phoebe Bridgers",
            [ProviderMetrics::Video(VideoMetrics {
                subscribers: 10,
                momentum: 5,
                recent_views: None,
            })],
            1_000,
        );

        assert!(snap.has(Provider::Video));
        assert_eq!(snap.missing(), vec![Provider::Streaming, Provider::Social]);
        assert_eq!(snap.fetched_at_ms, 1_000);
    }

    #[test]
    fn snapshot_json_tolerates_absent_providers() {
        let snap: ArtistMetricSnapshot = serde_json::from_str(
            r#"{"artist_key":"boygenius","streaming":{"popularity":71,"followers":900000}}"#,
        )
        .unwrap();

        assert_eq!(snap.streaming.as_ref().map(|s| s.popularity), Some(71));
        assert!(snap.video.is_none());
        assert!(snap.social.is_none());
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(2_000_000), "2,000,000");
    }
}
