//! # Core Types
//!
//! Fundamental data structures used throughout PivotDB.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Identifier assigned to every inserted object
pub type ObjectId = u64;

/// Raw distances from one object to every pivot, in pivot order
pub type PivotTuple = Vec<f64>;

/// Sort key of the ordered stores.
///
/// The scalar key orders records; the object id makes keys unique so that two
/// objects with the same pyramid key can coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub key: OrderedFloat<f64>,
    pub id: ObjectId,
}

impl SortKey {
    pub fn new(key: f64, id: ObjectId) -> Self {
        Self {
            key: OrderedFloat(key),
            id,
        }
    }

    /// Smallest key with the given scalar value
    pub fn lower_bound(key: f64) -> Self {
        Self::new(key, ObjectId::MIN)
    }

    /// Largest key with the given scalar value
    pub fn upper_bound(key: f64) -> Self {
        Self::new(key, ObjectId::MAX)
    }

    /// Key used by the raw-object table, ordered by id
    pub fn for_object(id: ObjectId) -> Self {
        Self::new(id as f64, id)
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.key.into_inner()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}#{}", self.key.into_inner(), self.id)
    }
}

/// Closed interval on one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    #[inline]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Declared range of the distance function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceBounds {
    pub min: f64,
    pub max: f64,
}

impl DistanceBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Rescale into `[0, 1]`; values outside the bounds clamp to the faces
    #[inline]
    pub fn normalize(&self, value: f64) -> f64 {
        ((value - self.min) / self.width()).clamp(0.0, 1.0)
    }

    pub fn normalize_tuple(&self, tuple: &[f64]) -> Vec<f64> {
        tuple.iter().map(|&v| self.normalize(v)).collect()
    }

    /// Query rectangle `[q_i - r, q_i + r]` clipped to the bounds.
    ///
    /// Returns `None` when some axis has no overlap with the bounds, in which
    /// case no indexed object can be within `radius` of the query.
    pub fn query_rect(&self, query: &[f64], radius: f64) -> Option<Vec<Interval>> {
        let mut rect = Vec::with_capacity(query.len());
        for &q in query {
            let iv = Interval::new((q - radius).max(self.min), (q + radius).min(self.max));
            if iv.is_empty() {
                return None;
            }
            rect.push(iv);
        }
        Some(rect)
    }
}

/// Lifecycle state of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    Unfrozen,
    Freezing,
    Frozen,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexState::Unfrozen => write!(f, "unfrozen"),
            IndexState::Freezing => write!(f, "freezing"),
            IndexState::Frozen => write!(f, "frozen"),
        }
    }
}

/// Result of an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored (and indexed when frozen)
    Inserted(ObjectId),
    /// Byte-identical object already present under this id
    Exists(ObjectId),
    /// Stored but left out of the trained structure: a distance fell outside
    /// the declared bounds after freeze
    Excluded(ObjectId),
}

impl InsertOutcome {
    pub fn id(&self) -> ObjectId {
        match *self {
            InsertOutcome::Inserted(id)
            | InsertOutcome::Exists(id)
            | InsertOutcome::Excluded(id) => id,
        }
    }
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<O> {
    pub id: ObjectId,
    pub object: O,
    pub distance: f64,
}
