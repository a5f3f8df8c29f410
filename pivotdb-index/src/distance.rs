//! # Reference Distance Functions
//!
//! Metrics shipped with the index for strings and dense vectors. Any type
//! implementing [`Metric`] can be indexed; these cover the common cases and
//! the test suites.

use pivotdb_core::Metric;

/// Levenshtein distance over Unicode scalar values
#[derive(Debug, Clone, Copy, Default)]
pub struct EditDistance;

impl EditDistance {
    /// Edit distance between two strings
    pub fn between(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        if a.is_empty() {
            return b.len();
        }
        if b.is_empty() {
            return a.len();
        }

        // Two-row dynamic programme
        let mut prev: Vec<usize> = (0..=b.len()).collect();
        let mut curr = vec![0usize; b.len() + 1];
        for (i, ca) in a.iter().enumerate() {
            curr[0] = i + 1;
            for (j, cb) in b.iter().enumerate() {
                let substitution = prev[j] + usize::from(ca != cb);
                curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
            }
            std::mem::swap(&mut prev, &mut curr);
        }
        prev[b.len()]
    }
}

impl Metric<String> for EditDistance {
    fn distance(&self, a: &String, b: &String) -> f64 {
        Self::between(a, b) as f64
    }

    fn name(&self) -> &str {
        "edit"
    }
}

/// L2 distance over `f32` vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanDistance;

/// Squared L2 distance, accumulated in four lanes
#[inline]
pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut lanes = [0.0f32; 4];
    let chunks_a = a.chunks_exact(4);
    let chunks_b = b.chunks_exact(4);
    let tail: f32 = chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    for (ca, cb) in chunks_a.zip(chunks_b) {
        for k in 0..4 {
            let d = ca[k] - cb[k];
            lanes[k] += d * d;
        }
    }
    lanes.iter().sum::<f32>() + tail
}

#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    l2_distance_squared(a, b).sqrt()
}

impl Metric<Vec<f32>> for EuclideanDistance {
    fn distance(&self, a: &Vec<f32>, b: &Vec<f32>) -> f64 {
        l2_distance(a, b) as f64
    }

    fn name(&self) -> &str {
        "l2"
    }
}

/// L1 distance over `f32` vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct ManhattanDistance;

#[inline]
pub fn l1_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

impl Metric<Vec<f32>> for ManhattanDistance {
    fn distance(&self, a: &Vec<f32>, b: &Vec<f32>) -> f64 {
        l1_distance(a, b) as f64
    }

    fn name(&self) -> &str {
        "l1"
    }
}
