// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurograph-pipeline
//!
//! Orchestration of the connectivity study: who is in the cohort, where
//! every file lives, what each stage does for one subject, and how a stage
//! runs over a whole batch.
//!
//! ```text
//! cohort ──► preprocess ──► extract ──► connectivity ──► metrics ──► compare
//!              log ─────────► log ─────────► log ──────────► log
//! ```
//!
//! Each batch stage reads the `SUCCESSFUL SUBJECTS:` section of the
//! previous stage's run log, so stages can be rerun independently.

pub mod batch;
pub mod cohort;
pub mod error;
pub mod layout;
pub mod report;
pub mod stages;

pub use batch::{
    run_pipeline, run_stage, run_stage_for, subjects_for, BatchOutcome, BatchRunner,
    OutputSummary, PipelineRun,
};
pub use cohort::{classify, subject_id, Cohort, CohortSubject, CohortSummary, Group, PhenotypicRecord};
pub use error::{PipelineError, PipelineResult};
pub use layout::{DataLayout, Stage};
pub use report::{
    diverging_color, group_comparison, render_heatmap, GroupComparison, GroupStats,
    MetricComparison,
};
pub use stages::{
    clean_options, connectivity_subject, extract_subject, metrics_subject, preprocess_subject, threshold_mode,
    Extractor, PipelineContext, StageReport, SubjectMetrics,
};
