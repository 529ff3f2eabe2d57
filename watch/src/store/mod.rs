pub mod sqlite_store;

use async_trait::async_trait;

use crate::model::{CitySighting, SeenEventRecord, SurgeWatch};

/// Durable home of the watch registry.
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// Inserts or refreshes `watch` in one atomic step.
    ///
    /// Returns `false` (and writes nothing) when the artist has no active
    /// watch and `max_active` active watches already exist. Refreshing an
    /// active watch only moves its expiry; reviving an expired one restarts
    /// its creation time.
    async fn upsert_watch_capped(
        &self,
        watch: &SurgeWatch,
        max_active: usize,
        now_ms: u64,
    ) -> anyhow::Result<bool>;

    /// `true` when a row was removed.
    async fn delete_watch(&self, artist_key: &str) -> anyhow::Result<bool>;

    /// Active watches, oldest registration first, ties by artist key.
    async fn list_active(&self, now_ms: u64) -> anyhow::Result<Vec<SurgeWatch>>;

    /// Drops expired rows; returns how many were removed.
    async fn purge_expired(&self, now_ms: u64) -> anyhow::Result<u64>;
}

/// Append-only record of events already notified.
#[async_trait]
pub trait SeenEventLedger: Send + Sync {
    /// Insert-if-absent keyed on `(artist_key, event_id)`. `true` only for
    /// the call that actually created the record.
    async fn record_if_new(&self, record: &SeenEventRecord) -> anyhow::Result<bool>;

    async fn contains(&self, artist_key: &str, event_id: &str) -> anyhow::Result<bool>;
}

/// Per-city history fed back into city ranking.
#[async_trait]
pub trait SightingStore: Send + Sync {
    /// Increments the `(artist, city)` counter and bumps its last-seen time.
    async fn record_sighting(&self, artist_key: &str, city: &str, now_ms: u64) -> anyhow::Result<()>;

    async fn sightings_for(&self, artist_key: &str) -> anyhow::Result<Vec<CitySighting>>;
}
