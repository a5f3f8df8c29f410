//! # PivotDB Core
//!
//! This crate provides the fundamental building blocks for PivotDB:
//! - Core data structures and traits
//! - Error types
//! - Configuration
//! - Metrics and per-query statistics
//! - Record encoding for the backing stores
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  pivotdb-core                   │
//! ├─────────────────────────────────────────────────┤
//! │  • types         - Ids, sort keys, bounds       │
//! │  • traits        - Store / metric / codec seams │
//! │  • error         - Error handling               │
//! │  • config        - Index configuration          │
//! │  • metrics       - Counters, stats, histograms  │
//! │  • digest        - Content digests (BLAKE3)     │
//! │  • serialization - Tuple record encoding        │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod digest;
pub mod error;
pub mod metrics;
pub mod serialization;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{CacheConfig, IndexConfig, StrategyConfig};
pub use digest::ContentDigest;
pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsSnapshot, QueryStats};
pub use traits::{BucketStore, Clusterer, Metric, ObjectCodec, OrderedStore, PivotSelector};
pub use types::{
    DistanceBounds, IndexState, InsertOutcome, Interval, ObjectId, PivotTuple, SearchHit,
    SortKey,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
