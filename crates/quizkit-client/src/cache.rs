//! TTL read-through cache for idempotent fetches.
//!
//! Entries expire lazily: a stale entry is only noticed, and dropped, when it
//! is read or when room is needed for an insert. Failed fetches are never
//! stored. The lock is not held while the fetcher runs, so two concurrent
//! misses on the same key may both fetch; the later insert wins.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use quizkit_core::clock::{Clock, SystemClock};
use quizkit_core::Result;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Cache key for an endpoint and its query parameters.
pub fn cache_key(path: &str, params: Option<&serde_json::Value>) -> String {
    match params {
        Some(p) if !p.is_null() => format!("{path}?{p}"),
        _ => path.to_string(),
    }
}

struct Entry {
    payload: Arc<dyn Any + Send + Sync>,
    inserted_at: DateTime<Utc>,
    ttl: Duration,
    seq: u64,
}

impl Entry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        // A clock that moved backwards counts as zero age.
        let age = (now - self.inserted_at).to_std().unwrap_or(Duration::ZERO);
        age < self.ttl
    }
}

pub struct ResponseCache {
    entries: Mutex<HashMap<String, Entry>>,
    default_ttl: Duration,
    max_entries: usize,
    seq: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            max_entries: max_entries.max(1),
            seq: AtomicU64::new(0),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached value for `key` if fresh, otherwise run `fetcher`
    /// and cache its success. `ttl` defaults to the cache's default.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, ttl: Option<Duration>, fetcher: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get::<T>(key) {
            tracing::debug!(key, "cache hit");
            return Ok(hit);
        }

        tracing::debug!(key, "cache miss");
        let value = fetcher().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// The fresh value under `key`, if any and of type `T`.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if !entry.is_fresh(now) {
            entries.remove(key);
            return None;
        }
        entry.payload.downcast_ref::<T>().cloned()
    }

    pub fn insert<T: Send + Sync + 'static>(&self, key: &str, value: T, ttl: Option<Duration>) {
        let now = self.clock.now();
        let mut entries = self.lock();

        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            entries.retain(|_, e| e.is_fresh(now));
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.seq)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    tracing::debug!(key = %oldest, "cache full, evicting oldest entry");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                payload: Arc::new(value),
                inserted_at: now,
                ttl: ttl.unwrap_or(self.default_ttl),
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
            },
        );
    }

    /// Remove entries whose key starts with `prefix`, or everything when
    /// `prefix` is `None`. Returns how many were removed.
    pub fn clear(&self, prefix: Option<&str>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        match prefix {
            Some(prefix) => entries.retain(|k, _| !k.starts_with(prefix)),
            None => entries.clear(),
        }
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}
