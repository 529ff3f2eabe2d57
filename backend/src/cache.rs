use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, instrument};

struct Entry<V> {
    value: V,
    stored_at_ms: u64,
    ttl_ms: u64,
    /// Position in `Inner::lru`.
    tick: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) > self.ttl_ms
    }
}

struct Inner<V> {
    map: HashMap<String, Entry<V>>,
    /// Recency ticks to keys; the first entry is the least recently used.
    lru: BTreeMap<u64, String>,
    next_tick: u64,
}

impl<V> Inner<V> {
    /// Marks `key` as most recently used.
    fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;

        if let Some(entry) = self.map.get_mut(key) {
            self.lru.remove(&entry.tick);
            entry.tick = tick;
            self.lru.insert(tick, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.map.remove(key)?;
        self.lru.remove(&entry.tick);
        Some(entry)
    }
}

/// Bounded in-memory cache with per-entry TTL and LRU eviction.
///
/// Guarantees:
/// - An entry is served while `now - stored_at <= ttl` and never after.
/// - Memory is bounded by `capacity`; on overflow expired entries are
///   purged first, then the least recently used entry is evicted.
/// - Keys are normalized (trimmed, inner whitespace collapsed, lowercased),
///   so `" Big  Thief"` and `"big thief"` share one entry.
///
/// Entries are never refreshed by the cache itself.
pub struct TtlCache<V> {
    name: &'static str,
    capacity: usize,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                lru: BTreeMap::new(),
                next_tick: 0,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str, now_ms: u64) -> Option<V> {
        let key = normalize_key(key);
        let mut inner = self.inner.lock();

        let expired = match inner.map.get(&key) {
            None => return None,
            Some(entry) => entry.is_expired(now_ms),
        };

        if expired {
            inner.remove(&key);
            debug!(cache = self.name, %key, "cache entry expired");
            return None;
        }

        inner.touch(&key);
        inner.map.get(&key).map(|e| e.value.clone())
    }

    #[instrument(skip(self, value), target = "cache", fields(cache = self.name))]
    pub fn set(&self, key: &str, value: V, ttl: Duration, now_ms: u64) {
        let key = normalize_key(key);
        let mut inner = self.inner.lock();

        let is_new = !inner.map.contains_key(&key);
        if is_new && inner.map.len() >= self.capacity {
            purge_expired(&mut inner, now_ms);

            if inner.map.len() >= self.capacity {
                if let Some((_, victim)) = inner.lru.pop_first() {
                    inner.map.remove(&victim);
                    debug!(evicted = %victim, "cache full; evicted least recently used");
                }
            }
        }

        inner.remove(&key);
        let tick = inner.next_tick;
        inner.next_tick += 1;
        inner.lru.insert(tick, key.clone());
        inner.map.insert(
            key,
            Entry {
                value,
                stored_at_ms: now_ms,
                ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
                tick,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let key = normalize_key(key);
        self.inner.lock().remove(&key).map(|e| e.value)
    }

    pub fn purge_expired(&self, now_ms: u64) -> usize {
        purge_expired(&mut self.inner.lock(), now_ms)
    }
}

/// Trim, collapse internal whitespace, lowercase.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn purge_expired<V>(inner: &mut Inner<V>, now_ms: u64) -> usize {
    let Inner { map, lru, .. } = inner;
    let before = map.len();
    map.retain(|_, e| {
        let keep = !e.is_expired(now_ms);
        if !keep {
            lru.remove(&e.tick);
        }
        keep
    });
    before - map.len()
}
