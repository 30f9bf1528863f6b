//! In-memory hot storage backed by DashMap.
//!
//! Holds encoded records keyed by `collection/id`. Used on its own for
//! memory-only engines and as the read cache in front of the durable tier.
//! All data is lost on process exit.

use dashmap::DashMap;

/// Concurrent in-memory store using a sharded hashmap.
#[derive(Debug)]
pub struct MemStore {
    data: DashMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Insert or replace a value.
    pub fn put(&self, key: &[u8], value: Vec<u8>) {
        self.data.insert(key.to_vec(), value);
    }

    /// Get a clone of the stored value.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).map(|v| v.value().clone())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All `(key, value)` pairs whose key starts with `prefix`, sorted by key.
    ///
    /// Snapshot semantics: not a consistent view under concurrent writes.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out: Vec<(Vec<u8>, Vec<u8>)> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get() {
        let store = MemStore::new();
        store.put(b"thesis/1", vec![10, 20]);
        assert_eq!(store.get(b"thesis/1"), Some(vec![10, 20]));
        assert_eq!(store.get(b"thesis/2"), None);
    }

    #[test]
    fn overwrite() {
        let store = MemStore::new();
        store.put(b"run/1", vec![1]);
        store.put(b"run/1", vec![2]);
        assert_eq!(store.get(b"run/1"), Some(vec![2]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn scan_prefix_filters_collections() {
        let store = MemStore::new();
        store.put(b"objection/b", vec![2]);
        store.put(b"objection/a", vec![1]);
        store.put(b"thesis/a", vec![3]);
        let hits = store.scan_prefix(b"objection/");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, b"objection/a".to_vec());
    }

    #[test]
    fn concurrent_access() {
        use std::sync::Arc;
        let store = Arc::new(MemStore::new());
        let handles: Vec<_> = (0..100u8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.put(format!("claim/{i}").as_bytes(), vec![i]);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 100);
    }
}
