//! Pivot selection strategies.

use rand::rngs::StdRng;
use rand::SeedableRng;

use pivotdb_core::{Error, ObjectId, PivotSelector, Result};

/// Uniform sample of the candidate ids, reproducible from a seed
#[derive(Debug, Clone)]
pub struct RandomPivotSelector {
    seed: u64,
}

impl RandomPivotSelector {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl PivotSelector for RandomPivotSelector {
    fn choose_pivot_ids(
        &self,
        count: usize,
        candidates: Option<&[ObjectId]>,
    ) -> Result<Vec<ObjectId>> {
        let candidates = candidates.unwrap_or(&[]);
        if candidates.len() < count {
            return Err(Error::PivotsUnavailable {
                requested: count,
                available: candidates.len(),
            });
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let picked = rand::seq::index::sample(&mut rng, candidates.len(), count);
        Ok(picked.into_iter().map(|i| candidates[i]).collect())
    }
}

/// Caller-chosen pivots, used in the order given
#[derive(Debug, Clone)]
pub struct FixedPivotSelector {
    ids: Vec<ObjectId>,
}

impl FixedPivotSelector {
    pub fn new(ids: Vec<ObjectId>) -> Self {
        Self { ids }
    }
}

impl PivotSelector for FixedPivotSelector {
    fn choose_pivot_ids(
        &self,
        count: usize,
        candidates: Option<&[ObjectId]>,
    ) -> Result<Vec<ObjectId>> {
        let usable: Vec<ObjectId> = match candidates {
            Some(candidates) => self
                .ids
                .iter()
                .copied()
                .filter(|id| candidates.contains(id))
                .collect(),
            None => self.ids.clone(),
        };
        if usable.len() < count {
            return Err(Error::PivotsUnavailable {
                requested: count,
                available: usable.len(),
            });
        }
        Ok(usable[..count].to_vec())
    }
}
