//! # TTL Cache
//!
//! In-process key → (value, inserted-at) map with a fixed lifetime and an
//! optional entry limit. Handlers reach the caches through [`AppState`],
//! never through globals.
//!
//! ```text
//! get(k) ──► entry present and age < ttl ──► Some(Cached { value, age })
//!        └─► missing or expired           ──► None  (caller recomputes, set(k, v))
//!
//! set(k, v) ──► drop expired ──► insert ──► over max_entries? evict oldest
//! ```
//!
//! [`AppState`]: crate::state::AppState

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A cache hit.
#[derive(Debug, Clone)]
pub struct Cached<V> {
    pub value: V,
    pub age: Duration,
}

impl<V> Cached<V> {
    /// Age in whole minutes, e.g. "12 minutes".
    pub fn age_label(&self) -> String {
        format_cache_age(self.age)
    }
}

/// Rounded minutes, the way cache ages are shown to clients.
pub fn format_cache_age(age: Duration) -> String {
    let minutes = (age.as_secs_f64() / 60.0).round() as u64;
    format!("{} minutes", minutes)
}

/// Snapshot of one cache for the `cache-status` endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub entries: usize,
    pub ttl_secs: u64,
    pub keys: Vec<EntryStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStatus {
    pub key: String,
    pub age: String,
    pub expires_in: String,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    max_entries: Option<usize>,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            max_entries: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Keeps at most `max` entries, evicting the oldest first.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the value when present and younger than the TTL.
    pub async fn get(&self, key: &K) -> Option<Cached<V>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        let age = entry.inserted_at.elapsed();
        (age < self.ttl).then(|| Cached {
            value: entry.value.clone(),
            age,
        })
    }

    pub async fn set(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );

        if let Some(max) = self.max_entries {
            while entries.len() > max {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        entries.remove(&k);
                    }
                    None => break,
                }
            }
        }
    }

    /// Removes one entry. Returns whether it was present.
    pub async fn invalidate(&self, key: &K) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn status(&self) -> CacheStatus {
        let entries = self.entries.read().await;
        let mut keys: Vec<EntryStatus> = entries
            .iter()
            .filter(|(_, e)| e.inserted_at.elapsed() < self.ttl)
            .map(|(k, e)| {
                let age = e.inserted_at.elapsed();
                EntryStatus {
                    key: k.to_string(),
                    age: format_cache_age(age),
                    expires_in: format_cache_age(self.ttl.saturating_sub(age)),
                }
            })
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));

        CacheStatus {
            entries: keys.len(),
            ttl_secs: self.ttl.as_secs(),
            keys,
        }
    }
}
