// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Undirected weighted graphs built from connectivity matrices

use crate::error::{GraphError, GraphResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Dense undirected graph: symmetric, non-negative weights, zero diagonal
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedGraph {
    weights: Array2<f64>,
}

impl WeightedGraph {
    /// Build a graph from an adjacency matrix
    ///
    /// The matrix is symmetrised by averaging, negative and non-finite
    /// weights become 0 and the diagonal is cleared.
    pub fn from_adjacency(adjacency: &Array2<f64>) -> GraphResult<Self> {
        let (rows, cols) = adjacency.dim();
        if rows != cols {
            return Err(GraphError::NotSquare { rows, cols });
        }
        let weights = Array2::from_shape_fn((rows, cols), |(i, j)| {
            if i == j {
                return 0.0;
            }
            let w = 0.5 * (adjacency[[i, j]] + adjacency[[j, i]]);
            if w.is_finite() && w > 0.0 {
                w
            } else {
                0.0
            }
        });
        Ok(Self { weights })
    }

    pub fn n_nodes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    #[inline]
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.weights[[i, j]]
    }

    #[inline]
    pub fn has_edge(&self, i: usize, j: usize) -> bool {
        self.weights[[i, j]] > 0.0
    }

    /// Nodes adjacent to `i`, in index order
    pub fn neighbors(&self, i: usize) -> Vec<usize> {
        self.weights
            .row(i)
            .iter()
            .enumerate()
            .filter(|(_, &w)| w > 0.0)
            .map(|(j, _)| j)
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        let n = self.n_nodes();
        (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|&(i, j)| self.has_edge(i, j))
            .count()
    }

    /// Edges present over edges possible
    pub fn density(&self) -> f64 {
        let n = self.n_nodes();
        if n < 2 {
            return 0.0;
        }
        self.edge_count() as f64 / (n * (n - 1) / 2) as f64
    }

    /// Sum of all edge weights (each undirected edge once)
    pub fn total_weight(&self) -> f64 {
        self.weights.sum() / 2.0
    }

    pub fn max_weight(&self) -> f64 {
        self.weights.iter().copied().fold(0.0, f64::max)
    }
}

/// How many edges of a connectivity matrix survive into the graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Keep the strongest `density` fraction of all possible edges
    Proportional { density: f64 },
    /// Keep edges whose weight is at least `min_weight`
    Absolute { min_weight: f64 },
}

/// Threshold a Fisher-z matrix into a [`WeightedGraph`]
///
/// Negative weights are discarded unless `absolute_values` is set, in which
/// case `|z|` is used. Proportional ties are broken by `(i, j)` order.
pub fn threshold(
    z: &Array2<f64>,
    mode: ThresholdMode,
    absolute_values: bool,
) -> GraphResult<WeightedGraph> {
    let base = if absolute_values {
        z.mapv(f64::abs)
    } else {
        z.clone()
    };
    let mut graph = WeightedGraph::from_adjacency(&base)?;
    let n = graph.n_nodes();

    match mode {
        ThresholdMode::Proportional { density } => {
            if !(density > 0.0 && density <= 1.0) {
                return Err(GraphError::InvalidParameter(format!(
                    "density must lie in (0, 1], got {}",
                    density
                )));
            }
            let possible = n * n.saturating_sub(1) / 2;
            let keep = (density * possible as f64).round() as usize;

            let mut edges: Vec<(usize, usize, f64)> = Vec::with_capacity(possible);
            for i in 0..n {
                for j in i + 1..n {
                    let w = graph.weights[[i, j]];
                    if w > 0.0 {
                        edges.push((i, j, w));
                    }
                }
            }
            // Stable sort keeps (i, j) order among equal weights
            edges.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));

            let mut kept = Array2::zeros((n, n));
            for &(i, j, w) in edges.iter().take(keep) {
                kept[[i, j]] = w;
                kept[[j, i]] = w;
            }
            graph.weights = kept;
        }
        ThresholdMode::Absolute { min_weight } => {
            if !(min_weight.is_finite() && min_weight >= 0.0) {
                return Err(GraphError::InvalidParameter(format!(
                    "min_weight must be non-negative, got {}",
                    min_weight
                )));
            }
            graph.weights.mapv_inplace(|w| if w >= min_weight { w } else { 0.0 });
        }
    }

    debug!(
        target: "neurograph-graph",
        "Thresholded {} nodes with {:?}: {} edges (density {:.3})",
        n,
        mode,
        graph.edge_count(),
        graph.density()
    );
    Ok(graph)
}
