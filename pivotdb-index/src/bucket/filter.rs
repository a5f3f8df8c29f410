//! Existence filter over bucket-id prefixes.
//!
//! Level `k` holds the low `k` bits of every populated bucket id. A miss is
//! authoritative; a hit only means the container lookup is worth doing.

use std::collections::HashSet;

use parking_lot::RwLock;

use super::split::prefix;

pub struct ExistenceFilter {
    /// `levels[k - 1]` holds the `k`-bit prefixes
    levels: Vec<RwLock<HashSet<u64>>>,
}

impl ExistenceFilter {
    pub fn new(pivot_count: usize) -> Self {
        Self {
            levels: (0..pivot_count).map(|_| RwLock::new(HashSet::new())).collect(),
        }
    }

    /// Register every prefix of a newly populated bucket
    pub fn register(&self, bucket_id: u64) {
        for (k, level) in self.levels.iter().enumerate() {
            let p = prefix(bucket_id, k + 1);
            if !level.read().contains(&p) {
                level.write().insert(p);
            }
        }
    }

    /// Whether some populated bucket starts with this `k`-bit prefix
    pub fn may_contain(&self, k: usize, bucket_prefix: u64) -> bool {
        if k == 0 {
            return true;
        }
        match self.levels.get(k - 1) {
            Some(level) => level.read().contains(&prefix(bucket_prefix, k)),
            None => false,
        }
    }

    /// Populated buckets (full-length prefixes)
    pub fn populated(&self) -> usize {
        self.levels.last().map_or(0, |l| l.read().len())
    }

    pub fn clear(&self) {
        for level in &self.levels {
            level.write().clear();
        }
    }
}
