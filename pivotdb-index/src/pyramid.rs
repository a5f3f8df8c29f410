//! # Extended Pyramid Technique
//!
//! Projects a point of the unit cube onto one of `2d` pyramids whose apex is
//! the cube center, and collapses it to the scalar key `pyramid + height`.
//! A query rectangle is decomposed into one key range per intersected
//! pyramid; every point inside the rectangle has its key inside one of the
//! reported ranges.
//!
//! All functions below except [`LocalTransform`] work on *centered*
//! coordinates, i.e. unit-cube coordinates shifted by `-0.5`, so every
//! component lies in `[-0.5, 0.5]`.
//!
//! ## Extended normalization
//!
//! Skewed data piles up in a few pyramids. Each dimension is therefore
//! remapped with `x ^ e` where `e = -1 / log2(m)` for the dimension's median
//! `m`, which sends the median to exactly `0.5`.

use pivotdb_core::Interval;

/// Medians are clamped into the open unit interval before deriving exponents
pub const MEDIAN_CLAMP: f64 = 1e-6;

/// Affine box normalization followed by the median-centering power map
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTransform {
    min: Vec<f64>,
    width: Vec<f64>,
    exponent: Vec<f64>,
}

#[inline]
fn centering_exponent(median: f64) -> f64 {
    let m = median.clamp(MEDIAN_CLAMP, 1.0 - MEDIAN_CLAMP);
    -1.0 / m.log2()
}

impl LocalTransform {
    /// Whole-cube transform centered on the given (normalized) medians
    pub fn global(medians: &[f64]) -> Self {
        Self {
            min: vec![0.0; medians.len()],
            width: vec![1.0; medians.len()],
            exponent: medians.iter().map(|&m| centering_exponent(m)).collect(),
        }
    }

    /// Transform over the bounding box of `points`, centered on their
    /// component-wise median inside that box
    pub fn from_points(points: &[&[f64]]) -> Self {
        let dims = points.first().map_or(0, |p| p.len());
        let mut min = vec![f64::INFINITY; dims];
        let mut max = vec![f64::NEG_INFINITY; dims];
        for p in points {
            for (i, &v) in p.iter().enumerate() {
                min[i] = min[i].min(v);
                max[i] = max[i].max(v);
            }
        }

        let mut width = Vec::with_capacity(dims);
        for i in 0..dims {
            let w = max[i] - min[i];
            // Flat dimension: every point maps to the low face
            width.push(if w > f64::EPSILON { w } else { 1.0 });
        }

        let exponent = (0..dims)
            .map(|i| {
                let mut column: Vec<f64> = points
                    .iter()
                    .map(|p| ((p[i] - min[i]) / width[i]).clamp(0.0, 1.0))
                    .collect();
                let center = crate::median::approximate_median(&mut column).unwrap_or(0.5);
                centering_exponent(center)
            })
            .collect();

        Self { min, width, exponent }
    }

    pub fn dims(&self) -> usize {
        self.exponent.len()
    }

    /// Unit-cube coordinate of `value` on dimension `i`; values outside the
    /// box clamp to its faces
    #[inline]
    pub fn apply_dim(&self, i: usize, value: f64) -> f64 {
        let x = ((value - self.min[i]) / self.width[i]).clamp(0.0, 1.0);
        x.powf(self.exponent[i])
    }

    pub fn apply(&self, point: &[f64]) -> Vec<f64> {
        point
            .iter()
            .enumerate()
            .map(|(i, &v)| self.apply_dim(i, v))
            .collect()
    }

    /// Centered coordinates of a point
    pub fn center_point(&self, point: &[f64]) -> Vec<f64> {
        point
            .iter()
            .enumerate()
            .map(|(i, &v)| self.apply_dim(i, v) - 0.5)
            .collect()
    }

    /// Centered image of a rectangle. The map is monotone per dimension, so
    /// the image of the corners bounds the image of the rectangle.
    pub fn center_rect(&self, rect: &[Interval]) -> Vec<Interval> {
        rect.iter()
            .enumerate()
            .map(|(i, iv)| {
                Interval::new(self.apply_dim(i, iv.min) - 0.5, self.apply_dim(i, iv.max) - 0.5)
            })
            .collect()
    }
}

/// First dimension with the largest absolute centered coordinate
#[inline]
fn dominant_dimension(t: &[f64]) -> usize {
    let mut best = 0;
    for j in 1..t.len() {
        if t[j].abs() > t[best].abs() {
            best = j;
        }
    }
    best
}

/// Pyramid of a centered point: `j*` below the center, `j* + d` otherwise
pub fn pyramid_number(t: &[f64]) -> usize {
    let j = dominant_dimension(t);
    if t[j] < 0.0 {
        j
    } else {
        j + t.len()
    }
}

/// Distance of a centered point from the apex along its pyramid's axis
pub fn height(t: &[f64]) -> f64 {
    t[dominant_dimension(t)].abs()
}

/// `pyramid_number + height`
pub fn pyramid_value(t: &[f64]) -> f64 {
    pyramid_number(t) as f64 + height(t)
}

/// Smallest absolute value in an interval
#[inline]
pub fn min_abs(iv: &Interval) -> f64 {
    if iv.min <= 0.0 && 0.0 <= iv.max {
        0.0
    } else {
        iv.min.abs().min(iv.max.abs())
    }
}

/// Whether pyramid `p` intersects the centered query rectangle
pub fn intersects(q: &[Interval], p: usize) -> bool {
    let d = q.len();
    let low_side = p < d;
    let dim = if low_side { p } else { p - d };

    if low_side {
        q[dim].min <= 0.0
            && (0..d)
                .filter(|&j| j != dim)
                .all(|j| q[dim].min <= -min_abs(&q[j]))
    } else {
        q[dim].max >= 0.0
            && (0..d)
                .filter(|&j| j != dim)
                .all(|j| q[dim].max >= min_abs(&q[j]))
    }
}

/// Height range `[low, high]` of pyramid `p` covering the rectangle, or
/// `None` when the pyramid is not intersected
pub fn scan_range(q: &[Interval], p: usize) -> Option<(f64, f64)> {
    if !intersects(q, p) {
        return None;
    }
    let d = q.len();
    let low_side = p < d;
    let dim = if low_side { p } else { p - d };

    let high = q[dim].min.abs().max(q[dim].max.abs()).min(0.5);

    let easy = q.iter().all(|iv| iv.min <= 0.0 && 0.0 <= iv.max);
    let low = if easy {
        0.0
    } else {
        // The pyramid's own axis only contributes the part on its side
        let own = if low_side {
            if q[dim].max < 0.0 {
                q[dim].max.abs()
            } else {
                0.0
            }
        } else if q[dim].min > 0.0 {
            q[dim].min
        } else {
            0.0
        };
        (0..d)
            .filter(|&j| j != dim)
            .map(|j| min_abs(&q[j]))
            .fold(own, f64::max)
    };

    if low > high {
        None
    } else {
        Some((low, high))
    }
}

/// Every intersected pyramid with its height range, in pyramid order
pub fn decompose(q: &[Interval]) -> Vec<(usize, f64, f64)> {
    (0..2 * q.len())
        .filter_map(|p| scan_range(q, p).map(|(low, high)| (p, low, high)))
        .collect()
}
