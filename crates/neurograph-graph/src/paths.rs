// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shortest paths over `1 / w` distances
//!
//! Graphs here are small and dense (one node per atlas region), so every
//! search is the O(n²) array form of Dijkstra.

use crate::graph::WeightedGraph;
use ndarray::Array2;
use std::collections::VecDeque;

/// Relative tolerance for treating two path lengths as equal
const TIE_TOLERANCE: f64 = 1e-10;

fn same_length(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Result of one single-source search
struct SearchTree {
    dist: Vec<f64>,
    /// Number of shortest paths from the source
    sigma: Vec<f64>,
    preds: Vec<Vec<usize>>,
    /// Nodes in order of finalisation
    order: Vec<usize>,
}

fn dijkstra(graph: &WeightedGraph, source: usize) -> SearchTree {
    let n = graph.n_nodes();
    let mut dist = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0; n];
    let mut preds = vec![Vec::new(); n];
    let mut done = vec![false; n];
    let mut order = Vec::with_capacity(n);
    dist[source] = 0.0;
    sigma[source] = 1.0;

    loop {
        let next = (0..n)
            .filter(|&v| !done[v] && dist[v].is_finite())
            .min_by(|&a, &b| dist[a].total_cmp(&dist[b]));
        let u = match next {
            Some(u) => u,
            None => break,
        };
        done[u] = true;
        order.push(u);

        for v in 0..n {
            let w = graph.weight(u, v);
            if w <= 0.0 || done[v] {
                continue;
            }
            let candidate = dist[u] + 1.0 / w;
            if dist[v].is_finite() && same_length(candidate, dist[v]) {
                sigma[v] += sigma[u];
                preds[v].push(u);
            } else if candidate < dist[v] {
                dist[v] = candidate;
                sigma[v] = sigma[u];
                preds[v].clear();
                preds[v].push(u);
            }
        }
    }

    SearchTree {
        dist,
        sigma,
        preds,
        order,
    }
}

/// All-pairs weighted shortest path lengths (`inf` when unreachable)
pub fn distance_matrix(graph: &WeightedGraph) -> Array2<f64> {
    let n = graph.n_nodes();
    let mut out = Array2::from_elem((n, n), f64::INFINITY);
    for s in 0..n {
        let tree = dijkstra(graph, s);
        for (t, d) in tree.dist.into_iter().enumerate() {
            out[[s, t]] = d;
        }
    }
    out
}

/// Mean shortest path length over reachable ordered pairs, 0 when none are
pub fn characteristic_path_length(distances: &Array2<f64>) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for ((i, j), &d) in distances.indexed_iter() {
        if i != j && d.is_finite() {
            total += d;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Mean of `1 / d` over all ordered pairs; unreachable pairs contribute 0
pub fn global_efficiency(distances: &Array2<f64>) -> f64 {
    let n = distances.nrows();
    if n < 2 {
        return 0.0;
    }
    let total: f64 = distances
        .indexed_iter()
        .filter(|((i, j), d)| i != j && d.is_finite() && **d > 0.0)
        .map(|(_, d)| 1.0 / d)
        .sum();
    total / (n * (n - 1)) as f64
}

/// Unweighted efficiency of the subgraph induced by `nodes`
fn binary_efficiency(graph: &WeightedGraph, nodes: &[usize]) -> f64 {
    let k = nodes.len();
    if k < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for s in 0..k {
        let mut hops = vec![usize::MAX; k];
        hops[s] = 0;
        let mut queue = VecDeque::from([s]);
        while let Some(u) = queue.pop_front() {
            for v in 0..k {
                if hops[v] == usize::MAX && graph.has_edge(nodes[u], nodes[v]) {
                    hops[v] = hops[u] + 1;
                    queue.push_back(v);
                }
            }
        }
        total += hops
            .iter()
            .enumerate()
            .filter(|&(t, &h)| t != s && h != usize::MAX)
            .map(|(_, &h)| 1.0 / h as f64)
            .sum::<f64>();
    }
    total / (k * (k - 1)) as f64
}

/// Binary local efficiency of every node: efficiency among its neighbours
pub fn local_efficiency(graph: &WeightedGraph) -> Vec<f64> {
    (0..graph.n_nodes())
        .map(|i| binary_efficiency(graph, &graph.neighbors(i)))
        .collect()
}

/// Weighted betweenness centrality (Brandes), normalised by `(n-1)(n-2)`
pub fn betweenness_centrality(graph: &WeightedGraph) -> Vec<f64> {
    let n = graph.n_nodes();
    let mut centrality = vec![0.0; n];
    for s in 0..n {
        let tree = dijkstra(graph, s);
        let mut delta = vec![0.0; n];
        for &w in tree.order.iter().rev() {
            for &v in &tree.preds[w] {
                delta[v] += tree.sigma[v] / tree.sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }
    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for c in centrality.iter_mut() {
            *c *= scale;
        }
    }
    centrality
}
