// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! On-disk layout of every pipeline input and output

use neurograph_config::{ExtractionConfig, PathsConfig};
use std::path::{Path, PathBuf};

/// Pipeline stage, used to pick run logs and output directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Preprocess,
    Extract,
    Connectivity,
    Metrics,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Preprocess,
        Stage::Extract,
        Stage::Connectivity,
        Stage::Metrics,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocessing",
            Stage::Extract => "extraction",
            Stage::Connectivity => "connectivity",
            Stage::Metrics => "metrics",
        }
    }

    /// First line of the stage's run log
    pub fn log_title(self) -> &'static str {
        match self {
            Stage::Preprocess => "PREPROCESSING LOG",
            Stage::Extract => "TIME SERIES EXTRACTION LOG",
            Stage::Connectivity => "CONNECTIVITY MATRIX CALCULATION LOG",
            Stage::Metrics => "GRAPH METRICS LOG",
        }
    }

    /// Stage whose run log lists this stage's input subjects
    pub fn previous(self) -> Option<Stage> {
        match self {
            Stage::Preprocess => None,
            Stage::Extract => Some(Stage::Preprocess),
            Stage::Connectivity => Some(Stage::Extract),
            Stage::Metrics => Some(Stage::Connectivity),
        }
    }
}

/// Resolved paths for one data directory
#[derive(Debug, Clone)]
pub struct DataLayout {
    phenotypic_file: PathBuf,
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    timeseries_dir: PathBuf,
    connectivity_dir: PathBuf,
    metrics_dir: PathBuf,
    results_dir: PathBuf,
    figures_dir: PathBuf,
    atlas_path: PathBuf,
    atlas_labels_path: PathBuf,
    session: String,
    bold_suffix: String,
}

impl DataLayout {
    pub fn new(paths: &PathsConfig, extraction: &ExtractionConfig) -> Self {
        Self {
            phenotypic_file: paths.resolve(&paths.phenotypic_file),
            raw_dir: paths.resolve(&paths.raw_dir),
            processed_dir: paths.resolve(&paths.processed_dir),
            timeseries_dir: paths.resolve(&paths.timeseries_dir),
            connectivity_dir: paths.resolve(&paths.connectivity_dir),
            metrics_dir: paths.resolve(&paths.metrics_dir),
            results_dir: paths.resolve(&paths.results_dir),
            figures_dir: paths.resolve(&paths.figures_dir),
            atlas_path: paths.resolve(&extraction.atlas_path),
            atlas_labels_path: paths.resolve(&extraction.labels_path),
            session: paths.session.clone(),
            bold_suffix: paths.bold_suffix.clone(),
        }
    }

    pub fn phenotypic_file(&self) -> &Path {
        &self.phenotypic_file
    }

    pub fn atlas_path(&self) -> &Path {
        &self.atlas_path
    }

    pub fn atlas_labels_path(&self) -> &Path {
        &self.atlas_labels_path
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    pub fn timeseries_dir(&self) -> &Path {
        &self.timeseries_dir
    }

    pub fn connectivity_dir(&self) -> &Path {
        &self.connectivity_dir
    }

    pub fn metrics_dir(&self) -> &Path {
        &self.metrics_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn figures_dir(&self) -> &Path {
        &self.figures_dir
    }

    /// `<raw>/<sub>/<session>/func/<sub>_<session>_<suffix>.nii.gz`
    pub fn raw_bold(&self, subject: &str) -> PathBuf {
        self.raw_dir
            .join(subject)
            .join(&self.session)
            .join("func")
            .join(format!(
                "{}_{}_{}.nii.gz",
                subject, self.session, self.bold_suffix
            ))
    }

    pub fn preprocessed(&self, subject: &str) -> PathBuf {
        self.processed_dir
            .join(subject)
            .join(format!("{}_preprocessed.nii.gz", subject))
    }

    pub fn timeseries(&self, subject: &str) -> PathBuf {
        self.timeseries_dir
            .join(format!("{}_timeseries.npy", subject))
    }

    /// Every atlas region in label-file order, the columns of a complete
    /// time series
    pub fn timeseries_labels(&self) -> PathBuf {
        self.timeseries_dir.join("atlas_labels.txt")
    }

    /// Columns of one subject's time series when some atlas regions had no
    /// voxels on its grid
    pub fn timeseries_subject_labels(&self, subject: &str) -> PathBuf {
        self.timeseries_dir.join(format!("{}_labels.txt", subject))
    }

    pub fn connectivity(&self, subject: &str) -> PathBuf {
        self.connectivity_dir
            .join(format!("{}_connectivity.npy", subject))
    }

    pub fn metrics(&self, subject: &str) -> PathBuf {
        self.metrics_dir.join(format!("{}_metrics.json", subject))
    }

    pub fn figure(&self, subject: &str) -> PathBuf {
        self.figures_dir
            .join(format!("{}_connectivity_matrix.png", subject))
    }

    /// Directory holding the preprocessing run log: the parent of the
    /// per-site processed directory
    fn preprocessing_log_dir(&self) -> &Path {
        match self.processed_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => &self.processed_dir,
        }
    }

    pub fn run_log(&self, stage: Stage) -> PathBuf {
        match stage {
            Stage::Preprocess => self.preprocessing_log_dir().join("preprocessing_log.txt"),
            Stage::Extract => self.timeseries_dir.join("extraction_log.txt"),
            Stage::Connectivity => self.connectivity_dir.join("connectivity_log.txt"),
            Stage::Metrics => self.metrics_dir.join("metrics_log.txt"),
        }
    }

    pub fn failed_subjects(&self) -> PathBuf {
        self.preprocessing_log_dir().join("failed_subjects.txt")
    }

    /// Per-subject output of a stage
    pub fn output(&self, stage: Stage, subject: &str) -> PathBuf {
        match stage {
            Stage::Preprocess => self.preprocessed(subject),
            Stage::Extract => self.timeseries(subject),
            Stage::Connectivity => self.connectivity(subject),
            Stage::Metrics => self.metrics(subject),
        }
    }

    pub fn sample_summary(&self) -> PathBuf {
        self.results_dir.join("sample_summary.txt")
    }

    pub fn group_comparison_json(&self) -> PathBuf {
        self.results_dir.join("group_comparison.json")
    }

    pub fn group_comparison_table(&self) -> PathBuf {
        self.results_dir.join("group_comparison.txt")
    }
}
