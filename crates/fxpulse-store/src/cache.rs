//! Keyed cache of immutable entries.
//!
//! Readers get an `Arc` snapshot and never wait on a writer. Writers take a
//! per-key async lock for the whole fetch-and-replace so each key has at most
//! one refresh in flight.

use dashmap::DashMap;
use fxpulse_core::CacheEntry;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

#[derive(Debug)]
pub struct CacheStore<T> {
    entries: DashMap<String, Arc<CacheEntry<T>>>,
    writers: DashMap<String, Arc<Mutex<()>>>,
}

impl<T> CacheStore<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            writers: DashMap::new(),
        }
    }

    /// Current entry snapshot.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry<T>>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Swap in a new entry, returning the previous one.
    ///
    /// Callers that fetch before replacing should hold a [`CacheWriter`]
    /// for the key instead.
    pub fn replace(&self, key: &str, entry: CacheEntry<T>) -> Option<Arc<CacheEntry<T>>> {
        trace!(key, provenance = %entry.provenance, "Cache entry replaced");
        self.entries.insert(key.to_string(), Arc::new(entry))
    }

    pub fn remove(&self, key: &str) -> Option<Arc<CacheEntry<T>>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Sorted keys that currently hold an entry.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exclusive writer for `key`. Waits while another writer holds it.
    pub async fn writer(&self, key: &str) -> CacheWriter<'_, T> {
        let lock = self
            .writers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        CacheWriter {
            store: self,
            key: key.to_string(),
            _guard: guard,
        }
    }
}

impl<T> Default for CacheStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one key's refresh.
pub struct CacheWriter<'a, T> {
    store: &'a CacheStore<T>,
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl<T> CacheWriter<'_, T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Entry as seen by this writer, before its own replacement.
    pub fn current(&self) -> Option<Arc<CacheEntry<T>>> {
        self.store.get(&self.key)
    }

    /// Publish the new entry and release the key.
    pub fn commit(self, entry: CacheEntry<T>) -> Arc<CacheEntry<T>> {
        let entry = Arc::new(entry);
        self.store
            .entries
            .insert(self.key.clone(), Arc::clone(&entry));
        trace!(key = %self.key, provenance = %entry.provenance, "Cache entry committed");
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpulse_core::{Provenance, RateTable};
    use std::time::Duration;

    fn table(rate: f64) -> CacheEntry<RateTable> {
        CacheEntry::live(
            RateTable::from([("usd".to_string(), rate)]),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let cache = CacheStore::new();
        cache.replace("eur", table(1.08));
        let before = cache.get("eur").unwrap();

        let previous = cache.replace("eur", table(1.09)).unwrap();
        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(before.value["usd"], 1.08);
        assert_eq!(cache.get("eur").unwrap().value["usd"], 1.09);
        assert_eq!(cache.keys(), vec!["eur"]);
    }

    #[tokio::test]
    async fn test_writer_commit_publishes() {
        let cache = CacheStore::new();
        cache.replace("eur", table(1.08));

        let writer = cache.writer("eur").await;
        let current = writer.current().unwrap();
        writer.commit(current.with_provenance(Provenance::Cached));

        assert_eq!(cache.get("eur").unwrap().provenance, Provenance::Cached);
    }

    #[tokio::test]
    async fn test_one_writer_per_key() {
        let cache: Arc<CacheStore<RateTable>> = Arc::new(CacheStore::new());
        let held = cache.writer("eur").await;

        let contender = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let writer = cache.writer("eur").await;
                writer.commit(table(2.0));
            })
        };

        // Other keys are not blocked
        cache.writer("gbp").await.commit(table(1.25));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("eur").is_none());

        held.commit(table(1.0));
        contender.await.unwrap();
        assert_eq!(cache.get("eur").unwrap().value["usd"], 2.0);
        assert_eq!(cache.len(), 2);
    }
}
