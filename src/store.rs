//! In-memory price history store

use crate::types::{CacheEntry, Sample};
use dashmap::DashMap;
use std::sync::Arc;

/// Per-coin cache of the last successfully fetched history
///
/// Entries are whole `Arc<CacheEntry>` values swapped in on each successful
/// fetch, so a reader holds either the old history or the new one, never a
/// mix. Entries are never evicted.
///
/// Keys are whatever clients ask for. The store only grows on successful
/// fetches, but the budget, the last-failure map in
/// [`FetchMetrics`](crate::metrics::FetchMetrics) and the coalescing slots
/// also keep one small record per distinct key that was ever requested, so
/// memory is bounded by the key space callers can reach. Front the cache with
/// an allow list (see [`PopularCoin`](crate::types::PopularCoin)) when keys
/// come from untrusted input.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: DashMap<String, Arc<CacheEntry>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the cached entry for a coin, if it was ever fetched
    pub fn get(&self, coin_id: &str) -> Option<Arc<CacheEntry>> {
        self.entries.get(coin_id).map(|entry| entry.value().clone())
    }

    /// Installs a new entry for a coin, replacing any previous one
    ///
    /// Last write wins; a slow fetch that finishes late overwrites a newer one.
    pub fn put(&self, coin_id: &str, samples: Vec<Sample>, now_millis: i64) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry::new(samples, now_millis));
        self.entries.insert(coin_id.to_string(), entry.clone());
        tracing::debug!(
            coin_id,
            data_points = entry.samples.len(),
            fetched_at_millis = now_millis,
            "Stored price history"
        );
        entry
    }

    /// True if an entry exists and is no older than `max_age_millis`
    pub fn contains_fresh(&self, coin_id: &str, now_millis: i64, max_age_millis: i64) -> bool {
        self.entries
            .get(coin_id)
            .is_some_and(|entry| entry.is_fresh(now_millis, max_age_millis))
    }

    pub fn contains(&self, coin_id: &str) -> bool {
        self.entries.contains_key(coin_id)
    }

    /// Snapshot of the cached coin ids
    ///
    /// Keys inserted while this runs may or may not be included.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Sample> {
        vec![Sample::new(1000, 100.0), Sample::new(2000, 110.0)]
    }

    #[test]
    fn test_missing_key_is_absent() {
        let store = HistoryStore::new();
        assert!(store.get("bitcoin").is_none());
        assert!(!store.contains_fresh("bitcoin", 0, i64::MAX));
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let store = HistoryStore::new();
        store.put("bitcoin", samples(), 5_000);

        let entry = store.get("bitcoin").unwrap();
        assert_eq!(&entry.samples[..], &samples()[..]);
        assert_eq!(entry.fetched_at_millis, 5_000);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_replaces_wholesale() {
        let store = HistoryStore::new();
        store.put("bitcoin", samples(), 1_000);
        let before = store.get("bitcoin").unwrap();

        store.put("bitcoin", vec![Sample::new(3000, 120.0)], 2_000);
        let after = store.get("bitcoin").unwrap();

        assert_eq!(after.samples.len(), 1);
        assert_eq!(after.fetched_at_millis, 2_000);
        // readers holding the old entry keep seeing it intact
        assert_eq!(before.samples.len(), 2);
    }

    #[test]
    fn test_contains_fresh_boundary() {
        let store = HistoryStore::new();
        store.put("bitcoin", samples(), 1_000);

        assert!(store.contains_fresh("bitcoin", 1_000, 100));
        assert!(store.contains_fresh("bitcoin", 1_100, 100));
        assert!(!store.contains_fresh("bitcoin", 1_101, 100));
    }

    #[test]
    fn test_keys_snapshot() {
        let store = HistoryStore::new();
        store.put("bitcoin", samples(), 0);
        store.put("ethereum", samples(), 0);

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["bitcoin", "ethereum"]);
    }
}
