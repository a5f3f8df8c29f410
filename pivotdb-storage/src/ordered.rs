//! # Ordered Store
//!
//! Concurrent skip list keyed by [`SortKey`] with a side index from object id
//! to key, so records can be addressed both by range and by id.
//!
//! ## Skip List Properties
//!
//! - O(log n) search, insert, delete
//! - Lock-free concurrent access
//! - Natural ordering by key (pyramid key, then object id)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use tracing::debug;

use pivotdb_core::{ObjectId, OrderedStore, Result, SortKey};

/// Store statistics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub entries: usize,
    pub size_bytes: usize,
}

/// In-memory [`OrderedStore`]
pub struct SkipListStore {
    name: String,
    data: Arc<SkipMap<SortKey, Bytes>>,
    id_index: DashMap<ObjectId, SortKey>,
    size_bytes: AtomicUsize,
}

impl SkipListStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(SkipMap::new()),
            id_index: DashMap::new(),
            size_bytes: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key currently stored for an object
    pub fn key_of(&self, id: ObjectId) -> Option<SortKey> {
        self.id_index.get(&id).map(|k| *k)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.data.len(),
            size_bytes: self.size_bytes.load(Ordering::Relaxed),
        }
    }

    fn remove_key(&self, key: &SortKey) {
        if let Some(entry) = self.data.remove(key) {
            self.size_bytes.fetch_sub(entry.value().len(), Ordering::Relaxed);
        }
    }
}

impl OrderedStore for SkipListStore {
    fn put(&self, key: SortKey, value: Bytes) -> Result<()> {
        if let Some(previous) = self.id_index.insert(key.id, key) {
            self.remove_key(&previous);
        }
        self.size_bytes.fetch_add(value.len(), Ordering::Relaxed);
        self.data.insert(key, value);
        Ok(())
    }

    fn range_scan(&self, low: SortKey, high: SortKey) -> Result<Vec<(SortKey, Bytes)>> {
        if low > high {
            return Ok(Vec::new());
        }
        Ok(self
            .data
            .range(low..=high)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect())
    }

    fn get(&self, id: ObjectId) -> Result<Option<Bytes>> {
        let Some(key) = self.key_of(id) else {
            return Ok(None);
        };
        Ok(self.data.get(&key).map(|entry| entry.value().clone()))
    }

    fn delete(&self, id: ObjectId) -> Result<bool> {
        match self.id_index.remove(&id) {
            Some((_, key)) => {
                self.remove_key(&key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn count(&self) -> Result<usize> {
        Ok(self.id_index.len())
    }

    fn scan_all(&self) -> Result<Vec<(SortKey, Bytes)>> {
        Ok(self
            .data
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect())
    }

    fn clear(&self) -> Result<()> {
        let entries = self.data.len();
        self.data.clear();
        self.id_index.clear();
        self.size_bytes.store(0, Ordering::Relaxed);
        debug!(store = %self.name, entries, "Ordered store cleared");
        Ok(())
    }
}
