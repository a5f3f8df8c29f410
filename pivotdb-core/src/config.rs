//! # Configuration Management
//!
//! Handles all configuration for a PivotDB index.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::DistanceBounds;

/// Largest pivot count the bucket-split strategy supports (bucket ids are `u64` bitmasks)
pub const MAX_BUCKET_PIVOTS: usize = 63;

/// Deepest space tree that can be requested
pub const MAX_SPACE_TREE_DEPTH: usize = 16;

/// Main index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Number of pivots chosen at freeze time
    pub pivot_count: usize,
    /// Smallest distance the metric can return
    pub min_distance: f64,
    /// Largest distance the metric can return
    pub max_distance: f64,
    /// Partitioning strategy trained at freeze time
    pub strategy: StrategyConfig,
    /// Objects sampled for median estimation (`None` scans everything)
    pub median_sample_size: Option<usize>,
    /// Capacity of the read-through pivot tuple cache (entries)
    pub tuple_cache_capacity: usize,
    /// Bins per pivot in the distance distribution
    pub histogram_bins: usize,
    /// Seed for pivot selection, sampling and clustering
    pub seed: u64,
    pub cache: CacheConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            pivot_count: 8,
            min_distance: 0.0,
            max_distance: 1.0,
            strategy: StrategyConfig::default(),
            median_sample_size: Some(10_000),
            tuple_cache_capacity: 4096,
            histogram_bins: 64,
            seed: 0x5eed,
            cache: CacheConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Load a configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Configuration {
            message: format!("Invalid configuration document: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn bounds(&self) -> DistanceBounds {
        DistanceBounds::new(self.min_distance, self.max_distance)
    }

    /// Reject configurations that cannot produce a working index
    pub fn validate(&self) -> Result<()> {
        if self.pivot_count == 0 {
            return Err(Error::configuration("pivot_count must be positive"));
        }
        if !self.min_distance.is_finite() || !self.max_distance.is_finite() {
            return Err(Error::configuration("distance bounds must be finite"));
        }
        if self.max_distance <= self.min_distance {
            return Err(Error::configuration(format!(
                "max_distance ({}) must exceed min_distance ({})",
                self.max_distance, self.min_distance
            )));
        }
        if self.median_sample_size == Some(0) {
            return Err(Error::configuration("median_sample_size must be positive"));
        }
        if self.tuple_cache_capacity == 0 {
            return Err(Error::configuration("tuple_cache_capacity must be positive"));
        }
        if self.histogram_bins == 0 {
            return Err(Error::configuration("histogram_bins must be positive"));
        }
        if self.cache.container_capacity == 0 {
            return Err(Error::configuration("cache.container_capacity must be positive"));
        }

        match &self.strategy {
            StrategyConfig::Pyramid => {}
            StrategyConfig::SpaceTree {
                depth,
                cluster_retries,
                cluster_iterations,
            } => {
                if *depth > MAX_SPACE_TREE_DEPTH {
                    return Err(Error::configuration(format!(
                        "space tree depth {} exceeds maximum {}",
                        depth, MAX_SPACE_TREE_DEPTH
                    )));
                }
                if *cluster_retries == 0 || *cluster_iterations == 0 {
                    return Err(Error::configuration(
                        "cluster_retries and cluster_iterations must be positive",
                    ));
                }
            }
            StrategyConfig::BucketSplit => {
                if self.pivot_count > MAX_BUCKET_PIVOTS {
                    return Err(Error::configuration(format!(
                        "bucket split supports at most {} pivots, got {}",
                        MAX_BUCKET_PIVOTS, self.pivot_count
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Partitioning strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Extended pyramid technique over the whole tuple space
    Pyramid,
    /// P+Tree: clustering-based bipartition, pyramid technique per leaf
    SpaceTree {
        depth: usize,
        cluster_retries: usize,
        cluster_iterations: usize,
    },
    /// D′-Index: one bucket per median-split bitmask
    BucketSplit,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Pyramid
    }
}

impl StrategyConfig {
    pub fn space_tree(depth: usize) -> Self {
        StrategyConfig::SpaceTree {
            depth,
            cluster_retries: 8,
            cluster_iterations: 20,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::Pyramid => "pyramid",
            StrategyConfig::SpaceTree { .. } => "space_tree",
            StrategyConfig::BucketSplit => "bucket_split",
        }
    }
}

/// Bucket container cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Decoded containers kept in memory
    pub container_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            container_capacity: 1024,
        }
    }
}
