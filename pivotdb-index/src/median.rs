//! Approximate per-pivot medians over a sample of pivot tuples.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use pivotdb_core::{Error, PivotTuple, Result};

/// Lower median of `values`, reordering them in place
pub fn approximate_median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mid = (values.len() - 1) / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    Some(*median)
}

/// One median per dimension, estimated from at most `sample` tuples.
///
/// The sample is drawn without replacement with a seeded generator, so the
/// same data and seed always give the same vector.
pub fn median_vector(tuples: &[PivotTuple], sample: Option<usize>, seed: u64) -> Result<Vec<f64>> {
    let dims = match tuples.first() {
        Some(t) => t.len(),
        None => {
            return Err(Error::Internal {
                message: "median of an empty tuple set".to_string(),
            })
        }
    };

    let rows: Vec<&PivotTuple> = match sample {
        Some(size) if size < tuples.len() => {
            let mut rng = StdRng::seed_from_u64(seed);
            rand::seq::index::sample(&mut rng, tuples.len(), size)
                .into_iter()
                .map(|i| &tuples[i])
                .collect()
        }
        _ => tuples.iter().collect(),
    };

    let medians = (0..dims)
        .into_par_iter()
        .map(|dim| {
            let mut column: Vec<f64> = rows.iter().map(|t| t[dim]).collect();
            approximate_median(&mut column).unwrap_or(0.0)
        })
        .collect();

    Ok(medians)
}
