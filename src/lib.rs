// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurograph
//!
//! Resting-state fMRI connectivity and graph-theory pipeline for comparing
//! brain-network organisation between children with subthreshold ADHD and
//! children with diagnosed ADHD.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! neurograph = "0.3"  # Default: pipeline + file logging
//! ```
//!
//! ## Feature Flags
//!
//! - **`pipeline`** (default): cohort, per-subject stages, batch runner, reports
//! - **`file-logging`** (default): rolling JSON log files under `logging.dir`
//!
//! Without `pipeline` the algorithm crates are still available for use on
//! arrays already in memory.
//!
//! ## Usage Examples
//!
//! ### Connectivity from a time-series matrix
//!
//! ```rust,no_run
//! use neurograph::prelude::*;
//!
//! let ts = read_npy(std::path::Path::new("sub-0010001_timeseries.npy"))?;
//! let z = fisher_z(&correlation_matrix(&ts)?, DEFAULT_CLIP)?;
//! assert!(check_connectivity(&z).passed());
//!
//! let graph = threshold(&z, ThresholdMode::Proportional { density: 0.15 }, false)?;
//! let metrics = compute_metrics(&graph);
//! println!("modularity {:.3}", metrics.global.modularity);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Whole study
//!
//! ```rust,no_run
//! # #[cfg(feature = "pipeline")]
//! # {
//! use neurograph::pipeline::{run_pipeline, BatchRunner, PipelineContext};
//!
//! let config = neurograph::config::load_config(None, None)?;
//! let ctx = PipelineContext::new(config);
//! let runner = BatchRunner::from_config(&ctx.config)?;
//! let run = run_pipeline(&ctx, &runner, false)?;
//! println!("{} stages run", run.outcomes.len());
//! # }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! neurograph (umbrella)
//! ├── neurograph-config         TOML configuration and overrides
//! ├── neurograph-observability  tracing setup, per-crate debug flags
//! ├── neurograph-io             NIfTI, NPY, run logs, label files
//! ├── neurograph-signal         cleaning and smoothing
//! ├── neurograph-connectivity   atlas extraction, correlation, Fisher z
//! ├── neurograph-graph          thresholding, metrics, statistics
//! └── neurograph-pipeline       cohort, stages, batch runner, reports
//! ```

pub use neurograph_config as config;
pub use neurograph_connectivity as connectivity;
pub use neurograph_graph as graph;
pub use neurograph_io as io;
pub use neurograph_observability as observability;
pub use neurograph_signal as signal;

#[cfg(feature = "pipeline")]
pub use neurograph_pipeline as pipeline;

/// Commonly used types and functions
pub mod prelude {
    pub use neurograph_config::{load_config, NeurographConfig};
    pub use neurograph_connectivity::{
        check_connectivity, correlation_matrix, extract_region_signals, fisher_z,
        resample_labels_nearest, Atlas, DEFAULT_CLIP,
    };
    pub use neurograph_graph::{
        benjamini_hochberg, compute_metrics, permutation_test, threshold, GlobalMetrics,
        GraphMetrics, ThresholdMode, WeightedGraph,
    };
    pub use neurograph_io::{read_nifti, read_npy, write_nifti, write_npy, NiftiImage};
    pub use neurograph_signal::{clean_volume, smooth_volume, CleanOptions};

    #[cfg(feature = "pipeline")]
    pub use neurograph_pipeline::{
        run_pipeline, BatchRunner, Cohort, DataLayout, Group, PipelineContext, Stage,
    };
}

/// Version of the umbrella crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
