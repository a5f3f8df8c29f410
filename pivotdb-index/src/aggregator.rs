//! # Bounded Result Aggregator
//!
//! Fixed-capacity top-k container. Once full, its largest distance is the
//! admissible search radius, which lets every search strategy shrink its
//! working radius as better answers arrive.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use pivotdb_core::{ObjectId, SearchHit};

/// Heap entry ordered by distance, then id
struct Entry<O> {
    id: ObjectId,
    object: O,
    distance: f64,
}

impl<O> PartialEq for Entry<O> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<O> Eq for Entry<O> {}

impl<O> PartialOrd for Entry<O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<O> Ord for Entry<O> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: the worst result sits on top
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// k-NN queue with radius tightening
pub struct BoundedResultSet<O> {
    capacity: usize,
    heap: BinaryHeap<Entry<O>>,
}

impl<O> BoundedResultSet<O> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            // Unbounded queries pass usize::MAX
            heap: BinaryHeap::with_capacity(capacity.min(1024).saturating_add(1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Largest distance currently held
    pub fn current_max(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.distance)
    }

    /// Admit a result if there is room or it beats the current maximum.
    /// Returns whether it was admitted.
    pub fn add(&mut self, id: ObjectId, object: O, distance: f64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if !self.is_full() {
            self.heap.push(Entry { id, object, distance });
            return true;
        }
        match self.current_max() {
            Some(max) if distance < max => {
                self.heap.pop();
                self.heap.push(Entry { id, object, distance });
                true
            }
            _ => false,
        }
    }

    /// Whether something at least `bound` away could still be admitted.
    /// Ties with the current maximum stay eligible.
    pub fn is_candidate(&self, bound: f64) -> bool {
        if !self.is_full() {
            return true;
        }
        match self.current_max() {
            Some(max) => bound <= max,
            None => self.capacity > 0,
        }
    }

    /// Working radius: `min(radius, current max)` once full, else `radius`
    pub fn update_range(&self, radius: f64) -> f64 {
        if self.capacity > 0 && self.is_full() {
            if let Some(max) = self.current_max() {
                return radius.min(max);
            }
        }
        radius
    }

    /// Results ascending by distance, ties by id
    pub fn into_sorted_vec(self) -> Vec<SearchHit<O>> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| SearchHit {
                id: e.id,
                object: e.object,
                distance: e.distance,
            })
            .collect()
    }
}
