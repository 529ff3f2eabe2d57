use std::sync::Arc;
use std::time::Duration;

use common::logger::warn_if_slow;
use common::time::DAY_MS;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::model::{SurgeWatch, normalize_artist_key};
use crate::store::WatchStore;

pub const DEFAULT_MAX_ACTIVE: usize = 10;
pub const DEFAULT_DURATION_DAYS: u32 = 5;

const SLOW_STORE_OP: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("artist name is required")]
    EmptyArtist,

    #[error("max surge artists reached ({max})")]
    CapacityReached { max: usize },

    #[error("no surge watch found for {0}")]
    NotFound(String),

    #[error("watch store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Bounded set of artists under surge watch.
pub struct WatchRegistry {
    store: Arc<dyn WatchStore>,
    max_active: usize,
    default_days: u32,
}

impl WatchRegistry {
    pub fn new(store: Arc<dyn WatchStore>) -> Self {
        Self::with_limits(store, DEFAULT_MAX_ACTIVE, DEFAULT_DURATION_DAYS)
    }

    pub fn with_limits(store: Arc<dyn WatchStore>, max_active: usize, default_days: u32) -> Self {
        Self {
            store,
            max_active: max_active.max(1),
            default_days: default_days.max(1),
        }
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Adds a watch, or extends the expiry of an existing one.
    ///
    /// `days` defaults to the configured duration and is floored at one.
    /// Adding a new artist while the registry is full is rejected; refreshing
    /// an already-active artist never is.
    #[instrument(skip(self), target = "registry")]
    pub async fn add_watch(
        &self,
        artist: &str,
        days: Option<u32>,
        now_ms: u64,
    ) -> Result<SurgeWatch, WatchError> {
        let artist_key = normalize_artist_key(artist).ok_or(WatchError::EmptyArtist)?;
        let days = days.unwrap_or(self.default_days).max(1);

        let watch = SurgeWatch {
            artist_key,
            created_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(u64::from(days) * DAY_MS),
        };

        let accepted = warn_if_slow(
            "watch_upsert",
            SLOW_STORE_OP,
            self.store.upsert_watch_capped(&watch, self.max_active, now_ms),
        )
        .await?;

        if !accepted {
            warn!(artist = %watch.artist_key, max = self.max_active, "surge watch rejected; registry full");
            return Err(WatchError::CapacityReached {
                max: self.max_active,
            });
        }

        info!(artist = %watch.artist_key, days, "surge watch enabled");
        Ok(watch)
    }

    #[instrument(skip(self), target = "registry")]
    pub async fn remove_watch(&self, artist: &str) -> Result<(), WatchError> {
        let artist_key = normalize_artist_key(artist).ok_or(WatchError::EmptyArtist)?;

        if self.store.delete_watch(&artist_key).await? {
            info!(artist = %artist_key, "surge watch removed");
            Ok(())
        } else {
            Err(WatchError::NotFound(artist_key))
        }
    }

    /// Active watches in registration order.
    pub async fn list_watches(&self, now_ms: u64) -> Result<Vec<SurgeWatch>, WatchError> {
        let watches = warn_if_slow(
            "watch_list",
            SLOW_STORE_OP,
            self.store.list_active(now_ms),
        )
        .await?;
        Ok(watches)
    }

    /// Removes expired rows. Listing already hides them; this only reclaims space.
    pub async fn purge_expired(&self, now_ms: u64) -> Result<u64, WatchError> {
        Ok(self.store.purge_expired(now_ms).await?)
    }
}
