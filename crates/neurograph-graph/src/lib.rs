// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# neurograph-graph

Network analysis of Fisher-z connectivity matrices.

## Modules

- `graph` - [`WeightedGraph`] and thresholding ([`ThresholdMode`])
- `paths` - weighted shortest paths and betweenness centrality
- `community` - Louvain community detection and modularity
- `metrics` - per-node and global metrics ([`GraphMetrics`], [`GlobalMetrics`])
- `stats` - permutation tests, Welch's t and Benjamini-Hochberg correction

Edge weights are strengths (larger = stronger coupling). Path-based
metrics use the distance `1 / w`.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod community;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod paths;
pub mod stats;

pub use community::{louvain, modularity, CommunityOptions, Partition};
pub use error::{GraphError, GraphResult};
pub use graph::{threshold, ThresholdMode, WeightedGraph};
pub use metrics::{compute_metrics, compute_metrics_with, GlobalMetrics, GraphMetrics};
pub use stats::{benjamini_hochberg, permutation_test, welch_t, PermutationResult};
