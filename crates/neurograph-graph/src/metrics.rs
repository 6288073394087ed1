// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Node-level and whole-graph network metrics

use crate::community::{louvain, CommunityOptions};
use crate::graph::WeightedGraph;
use crate::paths::{
    betweenness_centrality, characteristic_path_length, distance_matrix, global_efficiency,
    local_efficiency,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Whole-graph summary compared between groups
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub mean_degree: f64,
    pub mean_strength: f64,
    pub mean_clustering: f64,
    pub characteristic_path_length: f64,
    pub global_efficiency: f64,
    pub local_efficiency: f64,
    pub modularity: f64,
    pub density: f64,
    pub n_communities: usize,
}

impl GlobalMetrics {
    /// Metric names in report order
    pub const NAMES: [&'static str; 9] = [
        "mean_degree",
        "mean_strength",
        "mean_clustering",
        "characteristic_path_length",
        "global_efficiency",
        "local_efficiency",
        "modularity",
        "density",
        "n_communities",
    ];

    pub fn get(&self, name: &str) -> Option<f64> {
        Some(match name {
            "mean_degree" => self.mean_degree,
            "mean_strength" => self.mean_strength,
            "mean_clustering" => self.mean_clustering,
            "characteristic_path_length" => self.characteristic_path_length,
            "global_efficiency" => self.global_efficiency,
            "local_efficiency" => self.local_efficiency,
            "modularity" => self.modularity,
            "density" => self.density,
            "n_communities" => self.n_communities as f64,
            _ => return None,
        })
    }

    /// `(name, value)` pairs in [`GlobalMetrics::NAMES`] order
    pub fn values(&self) -> Vec<(&'static str, f64)> {
        Self::NAMES
            .iter()
            .filter_map(|&name| self.get(name).map(|v| (name, v)))
            .collect()
    }
}

/// Every metric of one graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub n_nodes: usize,
    pub n_edges: usize,
    pub degree: Vec<usize>,
    pub strength: Vec<f64>,
    pub clustering: Vec<f64>,
    pub local_efficiency: Vec<f64>,
    pub betweenness: Vec<f64>,
    pub communities: Vec<usize>,
    pub global: GlobalMetrics,
}

pub fn degree(graph: &WeightedGraph) -> Vec<usize> {
    (0..graph.n_nodes())
        .map(|i| graph.neighbors(i).len())
        .collect()
}

pub fn strength(graph: &WeightedGraph) -> Vec<f64> {
    graph
        .weights()
        .rows()
        .into_iter()
        .map(|r| r.sum())
        .collect()
}

/// Weighted clustering coefficient (Onnela et al. 2005)
///
/// Weights are normalised by the largest weight; each triangle contributes
/// the geometric mean of its three edges.
pub fn clustering(graph: &WeightedGraph) -> Vec<f64> {
    let n = graph.n_nodes();
    let max_w = graph.max_weight();
    if max_w <= 0.0 {
        return vec![0.0; n];
    }
    let norm = |i: usize, j: usize| graph.weight(i, j) / max_w;

    (0..n)
        .map(|i| {
            let nbrs = graph.neighbors(i);
            let k = nbrs.len();
            if k < 2 {
                return 0.0;
            }
            let mut triangles = 0.0;
            for (a, &j) in nbrs.iter().enumerate() {
                for &h in &nbrs[a + 1..] {
                    if graph.has_edge(j, h) {
                        triangles += (norm(i, j) * norm(i, h) * norm(j, h)).cbrt();
                    }
                }
            }
            2.0 * triangles / (k * (k - 1)) as f64
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// [`compute_metrics_with`] using default community options
pub fn compute_metrics(graph: &WeightedGraph) -> GraphMetrics {
    compute_metrics_with(graph, &CommunityOptions::default())
}

pub fn compute_metrics_with(graph: &WeightedGraph, options: &CommunityOptions) -> GraphMetrics {
    let degree = degree(graph);
    let strength = strength(graph);
    let clustering = clustering(graph);
    let local_efficiency = local_efficiency(graph);
    let betweenness = betweenness_centrality(graph);
    let distances = distance_matrix(graph);
    let partition = louvain(graph, options);

    let degree_f: Vec<f64> = degree.iter().map(|&d| d as f64).collect();
    let global = GlobalMetrics {
        mean_degree: mean(&degree_f),
        mean_strength: mean(&strength),
        mean_clustering: mean(&clustering),
        characteristic_path_length: characteristic_path_length(&distances),
        global_efficiency: global_efficiency(&distances),
        local_efficiency: mean(&local_efficiency),
        modularity: partition.modularity,
        density: graph.density(),
        n_communities: partition.n_communities(),
    };
    debug!(
        target: "neurograph-graph",
        "Metrics: {} nodes, {} edges, clustering {:.3}, path length {:.3}, Q {:.3}",
        graph.n_nodes(),
        graph.edge_count(),
        global.mean_clustering,
        global.characteristic_path_length,
        global.modularity
    );

    GraphMetrics {
        n_nodes: graph.n_nodes(),
        n_edges: graph.edge_count(),
        degree,
        strength,
        clustering,
        local_efficiency,
        betweenness,
        communities: partition.membership,
        global,
    }
}
