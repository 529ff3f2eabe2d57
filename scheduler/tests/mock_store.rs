#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use scheduler::{EventSource, FetchError, Notifier, SurgeNotice};
use watch::model::{CitySighting, Event, SeenEventRecord, SurgeWatch};
use watch::store::{SeenEventLedger, SightingStore, WatchStore};

/// Watches, ledger and sightings in memory.
#[derive(Default)]
pub struct MemStore {
    pub watches: Arc<Mutex<Vec<SurgeWatch>>>,
    pub seen: Arc<Mutex<HashSet<(String, String)>>>,
    pub sightings: Arc<Mutex<HashMap<(String, String), CitySighting>>>,
    pub ledger_down: bool,
}

impl MemStore {
    pub async fn with_watches(watches: Vec<SurgeWatch>) -> Self {
        let store = Self::default();
        *store.watches.lock().await = watches;
        store
    }
}

#[async_trait]
impl WatchStore for MemStore {
    async fn upsert_watch_capped(
        &self,
        watch: &SurgeWatch,
        _max_active: usize,
        _now_ms: u64,
    ) -> anyhow::Result<bool> {
        self.watches.lock().await.push(watch.clone());
        Ok(true)
    }

    async fn delete_watch(&self, artist_key: &str) -> anyhow::Result<bool> {
        let mut w = self.watches.lock().await;
        let before = w.len();
        w.retain(|x| x.artist_key != artist_key);
        Ok(w.len() != before)
    }

    async fn list_active(&self, now_ms: u64) -> anyhow::Result<Vec<SurgeWatch>> {
        let mut out: Vec<_> = self
            .watches
            .lock()
            .await
            .iter()
            .filter(|w| w.is_active(now_ms))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.artist_key.cmp(&b.artist_key))
        });
        Ok(out)
    }

    async fn purge_expired(&self, now_ms: u64) -> anyhow::Result<u64> {
        let mut w = self.watches.lock().await;
        let before = w.len();
        w.retain(|x| x.is_active(now_ms));
        Ok((before - w.len()) as u64)
    }
}

#[async_trait]
impl SeenEventLedger for MemStore {
    async fn record_if_new(&self, record: &SeenEventRecord) -> anyhow::Result<bool> {
        if self.ledger_down {
            anyhow::bail!("ledger offline");
        }
        Ok(self
            .seen
            .lock()
            .await
            .insert((record.artist_key.clone(), record.event_id.clone())))
    }

    async fn contains(&self, artist_key: &str, event_id: &str) -> anyhow::Result<bool> {
        Ok(self
            .seen
            .lock()
            .await
            .contains(&(artist_key.to_string(), event_id.to_string())))
    }
}

#[async_trait]
impl SightingStore for MemStore {
    async fn record_sighting(&self, artist_key: &str, city: &str, now_ms: u64) -> anyhow::Result<()> {
        let mut map = self.sightings.lock().await;
        let entry = map
            .entry((artist_key.to_string(), city.to_string()))
            .or_insert_with(|| CitySighting {
                artist_key: artist_key.to_string(),
                city: city.to_string(),
                count: 0,
                last_seen_ms: now_ms,
            });
        entry.count += 1;
        entry.last_seen_ms = now_ms;
        Ok(())
    }

    async fn sightings_for(&self, artist_key: &str) -> anyhow::Result<Vec<CitySighting>> {
        Ok(self
            .sightings
            .lock()
            .await
            .values()
            .filter(|s| s.artist_key == artist_key)
            .cloned()
            .collect())
    }
}

pub enum Scripted {
    Reply(Result<Vec<Event>, FetchError>),
    /// Never resolves; used to exercise cancellation of an in-flight fetch.
    Hang,
}

/// Replays scripted responses per artist; once a script runs dry the
/// fallback (if any) is returned forever, otherwise an empty list.
#[derive(Default)]
pub struct ScriptedSource {
    pub scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    pub fallback: Mutex<HashMap<String, Vec<Event>>>,
    pub calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedSource {
    pub async fn push(&self, artist: &str, reply: Scripted) {
        self.scripts
            .lock()
            .await
            .entry(artist.to_string())
            .or_default()
            .push_back(reply);
    }

    pub async fn always(&self, artist: &str, events: Vec<Event>) {
        self.fallback.lock().await.insert(artist.to_string(), events);
    }

    pub async fn call_times(&self) -> Vec<(String, Instant)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn fetch_events(&self, artist_key: &str) -> Result<Vec<Event>, FetchError> {
        self.calls
            .lock()
            .await
            .push((artist_key.to_string(), Instant::now()));

        let next = self
            .scripts
            .lock()
            .await
            .get_mut(artist_key)
            .and_then(|q| q.pop_front());

        match next {
            Some(Scripted::Reply(r)) => r,
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
            None => Ok(self
                .fallback
                .lock()
                .await
                .get(artist_key)
                .cloned()
                .unwrap_or_default()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SurgeNotice>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &SurgeNotice) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("webhook returned 500");
        }
        self.sent.lock().await.push(notice.clone());
        Ok(())
    }
}

pub fn event(id: Option<&str>, name: &str, city: Option<&str>) -> Event {
    Event {
        id: id.map(str::to_string),
        artist_key: String::new(),
        name: name.to_string(),
        venue: Some("Union Hall".into()),
        city: city.map(str::to_string),
        date: Some("2025-12-01".into()),
        time: Some("19:00:00".into()),
        url: Some(format!("https://tickets.example/{name}")),
        ..Event::default()
    }
}

pub fn watch(artist: &str, created_at_ms: u64, expires_at_ms: u64) -> SurgeWatch {
    SurgeWatch {
        artist_key: artist.to_string(),
        created_at_ms,
        expires_at_ms,
    }
}
