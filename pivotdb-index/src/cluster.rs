//! # Two-Way Clustering
//!
//! Lloyd's algorithm with k = 2 and k-means++ seeding, used by the space tree
//! to find a dividing hyperplane for each node.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pivotdb_core::{Clusterer, Error, Result};

#[inline]
fn squared_l2(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// 2-means clusterer
#[derive(Debug, Clone)]
pub struct KMeansClusterer {
    iterations: usize,
}

impl KMeansClusterer {
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// k-means++ seeding for two centroids
    fn seed_centroids(points: &[Vec<f64>], rng: &mut StdRng) -> [Vec<f64>; 2] {
        let first = points[rng.gen_range(0..points.len())].clone();

        // Second centroid sampled proportionally to D(x)^2
        let distances: Vec<f64> = points.iter().map(|p| squared_l2(p, &first)).collect();
        let total: f64 = distances.iter().sum();
        if total <= 0.0 {
            // All points coincide
            let second = points[rng.gen_range(0..points.len())].clone();
            return [first, second];
        }

        let mut target = rng.gen::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, d) in distances.iter().enumerate() {
            target -= d;
            if target <= 0.0 && *d > 0.0 {
                chosen = i;
                break;
            }
        }
        [first, points[chosen].clone()]
    }
}

impl Default for KMeansClusterer {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Clusterer for KMeansClusterer {
    fn bisect(&self, points: &[Vec<f64>], seed: u64) -> Result<[Vec<f64>; 2]> {
        if points.len() < 2 {
            return Err(Error::ClusteringFailed {
                attempts: 1,
                points: points.len(),
            });
        }

        let dim = points[0].len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = Self::seed_centroids(points, &mut rng);

        for _ in 0..self.iterations {
            let mut sums = [vec![0.0; dim], vec![0.0; dim]];
            let mut counts = [0usize; 2];

            for p in points {
                let c = usize::from(squared_l2(p, &centroids[1]) < squared_l2(p, &centroids[0]));
                counts[c] += 1;
                for (s, v) in sums[c].iter_mut().zip(p) {
                    *s += v;
                }
            }

            let mut moved = false;
            for c in 0..2 {
                if counts[c] == 0 {
                    continue;
                }
                let next: Vec<f64> = sums[c].iter().map(|s| s / counts[c] as f64).collect();
                if next != centroids[c] {
                    moved = true;
                    centroids[c] = next;
                }
            }
            if !moved {
                break;
            }
        }

        Ok(centroids)
    }
}
