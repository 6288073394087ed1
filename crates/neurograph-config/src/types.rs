// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `neurograph.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NeurographConfig {
    pub system: SystemConfig,
    pub paths: PathsConfig,
    pub cohort: CohortConfig,
    pub preprocessing: PreprocessingConfig,
    pub extraction: ExtractionConfig,
    pub connectivity: ConnectivityConfig,
    pub graph: GraphConfig,
    pub statistics: StatisticsConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

/// System-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub max_cores: usize,
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_cores: 0, // 0 = auto-detect
            log_level: "info".to_string(),
        }
    }
}

/// Data directory layout. Relative entries are resolved against `data_dir`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub phenotypic_file: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub timeseries_dir: PathBuf,
    pub connectivity_dir: PathBuf,
    pub metrics_dir: PathBuf,
    pub results_dir: PathBuf,
    pub figures_dir: PathBuf,
    /// BIDS session directory under each subject (`ses-1`)
    pub session: String,
    /// BIDS task/run suffix of the raw BOLD file
    pub bold_suffix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            phenotypic_file: PathBuf::from("phenotypic/NYU_phenotypic.csv"),
            raw_dir: PathBuf::from("raw/NYU"),
            processed_dir: PathBuf::from("processed/NYU"),
            timeseries_dir: PathBuf::from("timeseries"),
            connectivity_dir: PathBuf::from("connectivity"),
            metrics_dir: PathBuf::from("metrics"),
            results_dir: PathBuf::from("../results"),
            figures_dir: PathBuf::from("../results/figures"),
            session: "ses-1".to_string(),
            bold_suffix: "task-rest_run-1_bold".to_string(),
        }
    }
}

impl PathsConfig {
    /// Resolve a configured path against `data_dir` unless it is absolute
    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}

/// Phenotypic grouping thresholds on the ADHD Index T-score
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CohortConfig {
    pub subthreshold_min: f64,
    pub diagnosed_min: f64,
    pub missing_code: f64,
    pub index_column: String,
    pub id_column: String,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            subthreshold_min: 40.0,
            diagnosed_min: 60.0,
            missing_code: -999.0,
            index_column: "ADHD Index".to_string(),
            id_column: "ScanDir ID".to_string(),
        }
    }
}

/// Temporal cleaning and spatial smoothing of raw BOLD volumes
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Repetition time in seconds
    pub t_r: f64,
    pub detrend: bool,
    pub standardize: bool,
    /// Low-pass cutoff in Hz
    pub low_pass: Option<f64>,
    /// High-pass cutoff in Hz
    pub high_pass: Option<f64>,
    pub filter_order: usize,
    pub ensure_finite: bool,
    /// Gaussian smoothing kernel width in millimetres (0 disables smoothing)
    pub smoothing_fwhm: f64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            t_r: 2.0,
            detrend: true,
            standardize: true,
            low_pass: Some(0.1),
            high_pass: Some(0.01),
            filter_order: 5,
            ensure_finite: true,
            smoothing_fwhm: 6.0,
        }
    }
}

/// Region time-series extraction
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Integer label volume (NIfTI)
    pub atlas_path: PathBuf,
    /// `index: name` label list matching `atlas_path`
    pub labels_path: PathBuf,
    pub atlas_name: String,
    pub standardize: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            atlas_path: PathBuf::from("atlas/HarvardOxford-cort-maxprob-thr25-2mm.nii.gz"),
            labels_path: PathBuf::from("atlas/HarvardOxford-cort_labels.txt"),
            atlas_name: "Harvard-Oxford Cortical".to_string(),
            standardize: true,
        }
    }
}

/// Connectivity matrix computation
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Correlations are clipped to `[-clip, clip]` before the Fisher transform
    pub correlation_clip: f64,
    pub save_figures: bool,
    /// Heatmap pixels per matrix entry
    pub figure_cell_size: u32,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            correlation_clip: 0.9999,
            save_figures: false,
            figure_cell_size: 12,
        }
    }
}

/// How a weighted connectivity matrix is turned into a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    Proportional,
    Absolute,
}

/// Graph construction and metrics
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    pub threshold: ThresholdKind,
    /// Fraction of possible edges kept by proportional thresholding
    pub density: f64,
    /// Minimum weight kept by absolute thresholding
    pub min_weight: f64,
    /// Use |z| instead of discarding negative weights
    pub absolute_values: bool,
    /// Louvain resolution parameter
    pub resolution: f64,
    pub seed: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdKind::Proportional,
            density: 0.15,
            min_weight: 0.3,
            absolute_values: false,
            resolution: 1.0,
            seed: 42,
        }
    }
}

/// Group comparison
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatisticsConfig {
    pub permutations: usize,
    pub seed: u64,
    pub alpha: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            permutations: 5000,
            seed: 20260111,
            alpha: 0.05,
        }
    }
}

/// Batch execution
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Emit a progress update every N completed subjects
    pub progress_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            progress_interval: 25,
        }
    }
}

/// Logging output
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file_logging: bool,
    pub dir: PathBuf,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: false,
            dir: PathBuf::from("./logs"),
            retention_days: 30,
            retention_runs: 10,
        }
    }
}
