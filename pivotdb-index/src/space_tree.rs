//! # Space Tree (P+Tree)
//!
//! Recursive two-way partition of the normalized tuple space. Each node is
//! split by 2-means clustering; each leaf carries its own pyramid transform
//! fitted to the points that landed in it.
//!
//! Nodes live in an arena and refer to their children by index. Leaves are
//! numbered left to right, so a tree of depth `od` has leaf sequences
//! `0..2^od`.

use std::sync::Arc;

use tracing::{debug, warn};

use pivotdb_core::{Clusterer, Error, Interval, Result};

use crate::pyramid::LocalTransform;

#[derive(Debug, Clone)]
pub struct SpaceLeaf {
    pub sequence: u64,
    pub transform: LocalTransform,
}

#[derive(Debug, Clone)]
pub enum SpaceNode {
    Internal {
        dimension: usize,
        value: f64,
        left: usize,
        right: usize,
    },
    Leaf(SpaceLeaf),
}

/// Tree produced by the recursive build, before flattening into the arena
enum Built {
    Split {
        dimension: usize,
        value: f64,
        left: Box<Built>,
        right: Box<Built>,
    },
    Leaf(LocalTransform),
}

/// Clustering parameters for [`SpaceTree::build`]
#[derive(Clone)]
pub struct BuildOptions {
    pub depth: usize,
    pub retries: usize,
    pub seed: u64,
    pub clusterer: Arc<dyn Clusterer>,
}

#[derive(Debug, Clone)]
pub struct SpaceTree {
    nodes: Vec<SpaceNode>,
    leaf_count: usize,
}

impl SpaceTree {
    /// Single-leaf tree
    pub fn single(transform: LocalTransform) -> Self {
        Self {
            nodes: vec![SpaceNode::Leaf(SpaceLeaf {
                sequence: 0,
                transform,
            })],
            leaf_count: 1,
        }
    }

    /// Build over normalized points
    pub fn build(points: &[Vec<f64>], options: &BuildOptions) -> Result<Self> {
        let refs: Vec<&[f64]> = points.iter().map(|p| p.as_slice()).collect();
        let built = build_node(&refs, options.depth, options, options.seed)?;

        let mut tree = Self {
            nodes: Vec::with_capacity((1usize << (options.depth + 1)) - 1),
            leaf_count: 0,
        };
        tree.flatten(built);
        debug!(
            depth = options.depth,
            leaves = tree.leaf_count,
            points = points.len(),
            "Space tree built"
        );
        Ok(tree)
    }

    fn flatten(&mut self, built: Built) -> usize {
        match built {
            Built::Leaf(transform) => {
                let sequence = self.leaf_count as u64;
                self.leaf_count += 1;
                self.nodes.push(SpaceNode::Leaf(SpaceLeaf { sequence, transform }));
                self.nodes.len() - 1
            }
            Built::Split {
                dimension,
                value,
                left,
                right,
            } => {
                let slot = self.nodes.len();
                // Placeholder until the children have indices
                self.nodes.push(SpaceNode::Internal {
                    dimension,
                    value,
                    left: 0,
                    right: 0,
                });
                let l = self.flatten(*left);
                let r = self.flatten(*right);
                self.nodes[slot] = SpaceNode::Internal {
                    dimension,
                    value,
                    left: l,
                    right: r,
                };
                slot
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Leaf a normalized point belongs to
    pub fn leaf_of(&self, point: &[f64]) -> &SpaceLeaf {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                SpaceNode::Leaf(leaf) => return leaf,
                SpaceNode::Internal {
                    dimension,
                    value,
                    left,
                    right,
                } => {
                    idx = if point[*dimension] < *value { *left } else { *right };
                }
            }
        }
    }

    /// Leaves whose region intersects a normalized rectangle, left to right
    pub fn leaves_intersecting(&self, rect: &[Interval]) -> Vec<&SpaceLeaf> {
        let mut out = Vec::new();
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            match &self.nodes[idx] {
                SpaceNode::Leaf(leaf) => out.push(leaf),
                SpaceNode::Internal {
                    dimension,
                    value,
                    left,
                    right,
                } => {
                    // Right first so the left subtree pops first
                    if rect[*dimension].max >= *value {
                        stack.push(*right);
                    }
                    if rect[*dimension].min < *value {
                        stack.push(*left);
                    }
                }
            }
        }
        out
    }
}

fn build_node(points: &[&[f64]], depth: usize, options: &BuildOptions, seed: u64) -> Result<Built> {
    if depth == 0 {
        return Ok(Built::Leaf(LocalTransform::from_points(points)));
    }

    let (dimension, value, left, right) = split(points, options, seed)?;
    let left_seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    let right_seed = seed.wrapping_mul(6364136223846793005).wrapping_add(3);

    // Siblings are independent once the parent split is known
    let (l, r) = rayon::join(
        || build_node(&left, depth - 1, options, left_seed),
        || build_node(&right, depth - 1, options, right_seed),
    );

    Ok(Built::Split {
        dimension,
        value,
        left: Box::new(l?),
        right: Box::new(r?),
    })
}

type Split<'a> = (usize, f64, Vec<&'a [f64]>, Vec<&'a [f64]>);

/// Cluster, pick the widest centroid gap, and partition. Degenerate
/// outcomes are retried with a fresh seed.
fn split<'a>(points: &[&'a [f64]], options: &BuildOptions, seed: u64) -> Result<Split<'a>> {
    let owned: Vec<Vec<f64>> = points.iter().map(|p| p.to_vec()).collect();

    for attempt in 0..options.retries {
        let attempt_seed = seed.wrapping_add(attempt as u64);
        let centroids = match options.clusterer.bisect(&owned, attempt_seed) {
            Ok(c) => c,
            Err(e) => {
                warn!(attempt, points = points.len(), error = %e, "Clustering attempt failed");
                continue;
            }
        };

        let mut dimension = 0;
        let mut gap = 0.0;
        for (i, (a, b)) in centroids[0].iter().zip(&centroids[1]).enumerate() {
            let g = (a - b).abs();
            if g > gap {
                gap = g;
                dimension = i;
            }
        }
        if gap <= 0.0 {
            warn!(attempt, points = points.len(), "Clustering produced coincident centroids");
            continue;
        }

        let value = (centroids[0][dimension] + centroids[1][dimension]) / 2.0;
        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
            points.iter().copied().partition(|p| p[dimension] < value);
        if left.is_empty() || right.is_empty() {
            warn!(attempt, points = points.len(), "Clustering produced an empty side");
            continue;
        }
        return Ok((dimension, value, left, right));
    }

    Err(Error::ClusteringFailed {
        attempts: options.retries,
        points: points.len(),
    })
}
