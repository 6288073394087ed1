// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Louvain community detection
//!
//! Phase one moves single nodes to the neighbouring community with the best
//! modularity gain until nothing moves; phase two collapses communities into
//! nodes and repeats. Node visiting order is shuffled with a seeded RNG so a
//! given seed always gives the same partition.

use crate::graph::WeightedGraph;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Smallest modularity gain counted as an improvement
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommunityOptions {
    /// Resolution parameter γ; larger values favour smaller communities
    pub resolution: f64,
    pub seed: u64,
}

impl Default for CommunityOptions {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            seed: 42,
        }
    }
}

/// Community of each node (labels numbered from 0 by first appearance)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub membership: Vec<usize>,
    pub modularity: f64,
}

impl Partition {
    pub fn n_communities(&self) -> usize {
        self.membership.iter().max().map_or(0, |m| m + 1)
    }
}

/// Newman modularity of `membership` with resolution `gamma`
pub fn modularity(graph: &WeightedGraph, membership: &[usize], gamma: f64) -> f64 {
    let w = graph.weights();
    modularity_dense(w, membership, gamma)
}

fn modularity_dense(w: &Array2<f64>, membership: &[usize], gamma: f64) -> f64 {
    let two_m = w.sum();
    if two_m <= 0.0 {
        return 0.0;
    }
    let k: Vec<f64> = w.rows().into_iter().map(|r| r.sum()).collect();
    let mut q = 0.0;
    for ((i, j), &a) in w.indexed_iter() {
        if membership[i] == membership[j] {
            q += a - gamma * k[i] * k[j] / two_m;
        }
    }
    q / two_m
}

fn renumber(labels: &mut [usize]) {
    let mut map = std::collections::HashMap::new();
    for label in labels.iter_mut() {
        let next = map.len();
        *label = *map.entry(*label).or_insert(next);
    }
}

/// One round of local moves; returns the community of each node and whether anything moved
fn local_moves(w: &Array2<f64>, gamma: f64, rng: &mut StdRng) -> (Vec<usize>, bool) {
    let n = w.nrows();
    let two_m = w.sum();
    let k: Vec<f64> = w.rows().into_iter().map(|r| r.sum()).collect();
    let mut community: Vec<usize> = (0..n).collect();
    let mut total: Vec<f64> = k.clone();
    let mut moved_any = false;

    let mut order: Vec<usize> = (0..n).collect();
    loop {
        order.shuffle(rng);
        let mut moved = false;
        for &i in &order {
            let current = community[i];
            // Weight from i into each community, self-loop excluded
            let mut links: std::collections::BTreeMap<usize, f64> = Default::default();
            for j in 0..n {
                let a = w[[i, j]];
                if j != i && a > 0.0 {
                    *links.entry(community[j]).or_insert(0.0) += a;
                }
            }

            total[current] -= k[i];
            let gain = |c: usize, link: f64| link - gamma * total[c] * k[i] / two_m;
            let mut best = current;
            let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
            for (&c, &link) in &links {
                let g = gain(c, link);
                if g > best_gain + MIN_GAIN {
                    best = c;
                    best_gain = g;
                }
            }
            total[best] += k[i];
            if best != current {
                community[i] = best;
                moved = true;
                moved_any = true;
            }
        }
        if !moved {
            break;
        }
    }
    renumber(&mut community);
    (community, moved_any)
}

fn aggregate(w: &Array2<f64>, community: &[usize]) -> Array2<f64> {
    let size = community.iter().max().map_or(0, |m| m + 1);
    let mut out = Array2::zeros((size, size));
    for ((i, j), &a) in w.indexed_iter() {
        out[[community[i], community[j]]] += a;
    }
    out
}

/// Detect communities with the Louvain method
pub fn louvain(graph: &WeightedGraph, options: &CommunityOptions) -> Partition {
    let n = graph.n_nodes();
    let mut membership: Vec<usize> = (0..n).collect();
    if graph.total_weight() <= 0.0 {
        return Partition {
            membership,
            modularity: 0.0,
        };
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut w = graph.weights().clone();
    let mut level = 0;
    loop {
        let (community, moved) = local_moves(&w, options.resolution, &mut rng);
        if !moved {
            break;
        }
        for m in membership.iter_mut() {
            *m = community[*m];
        }
        w = aggregate(&w, &community);
        level += 1;
        trace!(
            target: "neurograph-graph",
            "Louvain level {}: {} communities",
            level,
            w.nrows()
        );
    }
    renumber(&mut membership);

    let modularity = modularity(graph, &membership, options.resolution);
    Partition {
        membership,
        modularity,
    }
}
