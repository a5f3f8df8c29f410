//! # PivotDB Storage
//!
//! In-memory implementations of the store seams the index consumes.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Write Path                              │
//! │                                                              │
//! │  Pyramid key ──> SkipListStore (SortKey ──> tuple record)   │
//! │  Raw object  ──> SkipListStore (object id ──> bytes)        │
//! │  Bucket      ──> MemoryBucketStore (bucket id ──> container)│
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Read Path                               │
//! │                                                              │
//! │  Range query ──> SkipListStore::range_scan (ordered)        │
//! │  Bucket scan ──> ContainerCache ──miss──> MemoryBucketStore │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bucket_store;
pub mod cache;
pub mod ordered;

pub use bucket_store::MemoryBucketStore;
pub use cache::{CacheStats, ContainerCache};
pub use ordered::{SkipListStore, StoreStats};
