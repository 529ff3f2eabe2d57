//! SQLite persistence for watches, the seen-event ledger and city sightings.
//!
//! Artist keys are compared case-insensitively (`COLLATE NOCASE`), so
//! "Big Thief" and "big thief" are the same watch. Every read-modify-write
//! is a single statement so concurrent writers cannot overshoot the watch
//! cap or double-record an event.

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, instrument};

use super::{SeenEventLedger, SightingStore, WatchStore};
use crate::model::{CitySighting, SeenEventRecord, SurgeWatch};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS surge_watches (
        artist_key TEXT PRIMARY KEY COLLATE NOCASE,
        created_at_ms INTEGER NOT NULL,
        expires_at_ms INTEGER NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS seen_events (
        artist_key TEXT NOT NULL COLLATE NOCASE,
        event_id TEXT NOT NULL,
        name TEXT NOT NULL,
        event_time_local TEXT,
        event_time_utc TEXT,
        venue TEXT,
        city TEXT,
        url TEXT,
        first_seen_ms INTEGER NOT NULL,
        PRIMARY KEY (artist_key, event_id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS city_sightings (
        artist_key TEXT NOT NULL COLLATE NOCASE,
        city TEXT NOT NULL COLLATE NOCASE,
        count INTEGER NOT NULL,
        last_seen_ms INTEGER NOT NULL,
        PRIMARY KEY (artist_key, city)
    );
    "#,
];

#[derive(Clone)]
pub struct SqliteWatchStore {
    pool: SqlitePool,
}

impl SqliteWatchStore {
    /// Wraps an existing pool. The caller is responsible for [`Self::migrate`].
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to `url` (creating the file if needed) and ensures the
    /// schema exists.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("parse sqlite url {url}"))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("connect sqlite at {url}"))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .context("create watch schema")?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Millisecond columns are signed; values past `i64::MAX` saturate.
fn to_db_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Reads a millisecond column. Only a corrupt row holds a negative value,
/// which reads as the epoch.
fn ms_column(row: &SqliteRow, column: &str) -> Result<u64, sqlx::Error> {
    let raw: i64 = row.try_get(column)?;
    Ok(u64::try_from(raw).unwrap_or(0))
}

fn watch_from_row(row: &SqliteRow) -> Result<SurgeWatch, sqlx::Error> {
    Ok(SurgeWatch {
        artist_key: row.try_get("artist_key")?,
        created_at_ms: ms_column(row, "created_at_ms")?,
        expires_at_ms: ms_column(row, "expires_at_ms")?,
    })
}

#[async_trait]
impl WatchStore for SqliteWatchStore {
    #[instrument(skip(self, watch), fields(artist = %watch.artist_key))]
    async fn upsert_watch_capped(
        &self,
        watch: &SurgeWatch,
        max_active: usize,
        now_ms: u64,
    ) -> anyhow::Result<bool> {
        let now = to_db_ms(now_ms);

        // The INSERT ... SELECT produces no row (and therefore no write) when
        // the artist is not already active and the cap is reached.
        let result = sqlx::query(
            r#"
            INSERT INTO surge_watches (artist_key, created_at_ms, expires_at_ms)
            SELECT ?, ?, ?
            WHERE EXISTS (
                    SELECT 1 FROM surge_watches
                    WHERE artist_key = ? AND expires_at_ms > ?
                )
               OR (SELECT COUNT(1) FROM surge_watches WHERE expires_at_ms > ?) < ?
            ON CONFLICT(artist_key) DO UPDATE SET
                created_at_ms = CASE
                    WHEN surge_watches.expires_at_ms > ? THEN surge_watches.created_at_ms
                    ELSE excluded.created_at_ms
                END,
                expires_at_ms = excluded.expires_at_ms;
            "#,
        )
        .bind(&watch.artist_key)
        .bind(to_db_ms(watch.created_at_ms))
        .bind(to_db_ms(watch.expires_at_ms))
        .bind(&watch.artist_key)
        .bind(now)
        .bind(now)
        .bind(i64::try_from(max_active).unwrap_or(i64::MAX))
        .bind(now)
        .execute(&self.pool)
        .await
        .context("upsert surge watch")?;

        let accepted = result.rows_affected() > 0;
        debug!(accepted, "upsert watch");
        Ok(accepted)
    }

    async fn delete_watch(&self, artist_key: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM surge_watches WHERE artist_key = ?")
            .bind(artist_key)
            .execute(&self.pool)
            .await
            .context("delete surge watch")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self, now_ms: u64) -> anyhow::Result<Vec<SurgeWatch>> {
        let rows = sqlx::query(
            r#"
            SELECT artist_key, created_at_ms, expires_at_ms
            FROM surge_watches
            WHERE expires_at_ms > ?
            ORDER BY created_at_ms ASC, artist_key ASC
            "#,
        )
        .bind(to_db_ms(now_ms))
        .fetch_all(&self.pool)
        .await
        .context("list active watches")?;

        rows.iter()
            .map(|r| watch_from_row(r).context("decode surge watch row"))
            .collect()
    }

    async fn purge_expired(&self, now_ms: u64) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM surge_watches WHERE expires_at_ms <= ?")
            .bind(to_db_ms(now_ms))
            .execute(&self.pool)
            .await
            .context("purge expired watches")?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SeenEventLedger for SqliteWatchStore {
    async fn record_if_new(&self, record: &SeenEventRecord) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO seen_events (
                artist_key, event_id, name,
                event_time_local, event_time_utc,
                venue, city, url, first_seen_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(artist_key, event_id) DO NOTHING;
            "#,
        )
        .bind(&record.artist_key)
        .bind(&record.event_id)
        .bind(&record.name)
        .bind(&record.event_time_local)
        .bind(&record.event_time_utc)
        .bind(&record.venue)
        .bind(&record.city)
        .bind(&record.url)
        .bind(to_db_ms(record.first_seen_ms))
        .execute(&self.pool)
        .await
        .context("record seen event")?;

        Ok(result.rows_affected() > 0)
    }

    async fn contains(&self, artist_key: &str, event_id: &str) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT 1 FROM seen_events WHERE artist_key = ? AND event_id = ?")
            .bind(artist_key)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .context("lookup seen event")?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl SightingStore for SqliteWatchStore {
    async fn record_sighting(&self, artist_key: &str, city: &str, now_ms: u64) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO city_sightings (artist_key, city, count, last_seen_ms)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(artist_key, city) DO UPDATE SET
                count = city_sightings.count + 1,
                last_seen_ms = MAX(city_sightings.last_seen_ms, excluded.last_seen_ms);
            "#,
        )
        .bind(artist_key)
        .bind(city.trim())
        .bind(to_db_ms(now_ms))
        .execute(&self.pool)
        .await
        .context("record city sighting")?;

        Ok(())
    }

    async fn sightings_for(&self, artist_key: &str) -> anyhow::Result<Vec<CitySighting>> {
        let rows = sqlx::query(
            r#"
            SELECT artist_key, city, count, last_seen_ms
            FROM city_sightings
            WHERE artist_key = ?
            ORDER BY count DESC, city ASC
            "#,
        )
        .bind(artist_key)
        .fetch_all(&self.pool)
        .await
        .context("list city sightings")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match sighting_from_row(&row) {
                Ok(s) => out.push(s),
                Err(err) => tracing::warn!(error = %err, "skipping undecodable city sighting row"),
            }
        }
        Ok(out)
    }
}

fn sighting_from_row(row: &SqliteRow) -> Result<CitySighting, sqlx::Error> {
    Ok(CitySighting {
        artist_key: row.try_get("artist_key")?,
        city: row.try_get("city")?,
        count: u32::try_from(row.try_get::<i64, _>("count")?.max(0)).unwrap_or(u32::MAX),
        last_seen_ms: ms_column(row, "last_seen_ms")?,
    })
}
