//! Median split functions and bucket identity.

/// Two-way split: 0 at or below the median, 1 above
#[inline]
pub fn bps(median: f64, distance: f64) -> u8 {
    if distance <= median {
        0
    } else {
        1
    }
}

/// Three-way split with exclusion zone `rho` around the median: 0 at or
/// below `median - rho`, 1 above `median + rho`, 2 in between
#[inline]
pub fn bps_exclusion(median: f64, distance: f64, rho: f64) -> u8 {
    if distance <= median - rho {
        0
    } else if distance > median + rho {
        1
    } else {
        2
    }
}

/// Split sides a query interval `[lo, hi]` can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRange {
    Lower,
    Upper,
    Both,
    /// Empty interval
    Neither,
}

impl SplitRange {
    pub fn lower(&self) -> bool {
        matches!(self, SplitRange::Lower | SplitRange::Both)
    }

    pub fn upper(&self) -> bool {
        matches!(self, SplitRange::Upper | SplitRange::Both)
    }
}

/// Classify a query interval against a median
#[inline]
pub fn bps_range(median: f64, lo: f64, hi: f64) -> SplitRange {
    if lo > hi {
        return SplitRange::Neither;
    }
    match (lo <= median, hi > median) {
        (true, true) => SplitRange::Both,
        (true, false) => SplitRange::Lower,
        (false, true) => SplitRange::Upper,
        (false, false) => SplitRange::Neither,
    }
}

/// Bucket id of a raw tuple: bit `i` set when pivot `i` splits high
pub fn bucket_id(medians: &[f64], tuple: &[f64]) -> u64 {
    let mut id = 0u64;
    for (i, (&m, &d)) in medians.iter().zip(tuple).enumerate() {
        if bps(m, d) == 1 {
            id |= 1u64 << i;
        }
    }
    id
}

/// Low `k` bits of a bucket id
#[inline]
pub fn prefix(id: u64, k: usize) -> u64 {
    if k >= 64 {
        id
    } else {
        id & ((1u64 << k) - 1)
    }
}

/// Placement of one object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBucket {
    pub bucket_id: u64,
    pub level: u32,
    pub smap_vector: Vec<f64>,
    pub is_exclusion: bool,
}

impl ObjectBucket {
    /// First-level placement under the decisive split
    pub fn place(medians: &[f64], tuple: &[f64]) -> Self {
        Self {
            bucket_id: bucket_id(medians, tuple),
            level: 0,
            smap_vector: tuple.to_vec(),
            is_exclusion: false,
        }
    }
}
