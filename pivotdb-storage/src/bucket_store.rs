//! # Bucket Store
//!
//! Long-keyed store backing the bucket containers.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use pivotdb_core::{BucketStore, Result};

/// In-memory [`BucketStore`]
#[derive(Default)]
pub struct MemoryBucketStore {
    buckets: DashMap<u64, Bytes>,
    writes: AtomicU64,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls served
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Ids of every stored bucket, ascending
    pub fn bucket_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.buckets.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }
}

impl BucketStore for MemoryBucketStore {
    fn put(&self, bucket_id: u64, value: Bytes) -> Result<()> {
        self.buckets.insert(bucket_id, value);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn get(&self, bucket_id: u64) -> Result<Option<Bytes>> {
        Ok(self.buckets.get(&bucket_id).map(|e| e.value().clone()))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.buckets.len())
    }

    fn clear(&self) -> Result<()> {
        debug!(buckets = self.buckets.len(), "Bucket store cleared");
        self.buckets.clear();
        Ok(())
    }
}
