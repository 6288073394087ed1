// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Batch execution of pipeline stages
//!
//! A batch takes its subjects from the previous stage's run log (or, for
//! preprocessing, from the cohort), runs the stage for each one on a
//! dedicated rayon pool, keeps going past failures and writes its own log.

use crate::cohort::Cohort;
use crate::error::{PipelineError, PipelineResult};
use crate::layout::Stage;
use crate::report::{group_comparison, GroupComparison};
use crate::stages::{
    connectivity_subject, metrics_subject, preprocess_subject, remove_stale, Extractor,
    PipelineContext, StageReport,
};
use neurograph_config::NeurographConfig;
use neurograph_io::{read_labels, read_successful_subjects, write_failed_subjects, RunLog};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Count and total size of the files a batch produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputSummary {
    pub files: usize,
    pub bytes: u64,
}

impl OutputSummary {
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Result of one batch, subjects in input order
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub stage: Stage,
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    /// `(subject, error)` for every failure
    pub errors: Vec<(String, String)>,
    pub reports: Vec<StageReport>,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Re-check that every reported output exists and sum the sizes
    pub fn verify_outputs(&self) -> OutputSummary {
        let mut summary = OutputSummary::default();
        for report in &self.reports {
            if let Ok(meta) = std::fs::metadata(&report.output) {
                summary.files += 1;
                summary.bytes += meta.len();
            }
        }
        summary
    }
}

fn minutes(d: Duration) -> f64 {
    d.as_secs_f64() / 60.0
}

/// Runs a stage over many subjects on its own thread pool
pub struct BatchRunner {
    pool: rayon::ThreadPool,
    progress_interval: usize,
}

impl BatchRunner {
    /// `max_cores == 0` uses every core
    pub fn new(max_cores: usize, progress_interval: usize) -> PipelineResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_cores)
            .thread_name(|i| format!("neurograph-worker-{}", i))
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
        Ok(Self {
            pool,
            progress_interval: progress_interval.max(1),
        })
    }

    pub fn from_config(config: &NeurographConfig) -> PipelineResult<Self> {
        Self::new(config.system.max_cores, config.batch.progress_interval)
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task` for every subject; failures are recorded, not propagated
    pub fn run<F>(&self, stage: Stage, subjects: &[String], task: F) -> BatchOutcome
    where
        F: Fn(&str) -> PipelineResult<StageReport> + Sync,
    {
        let total = subjects.len();
        let start = Instant::now();
        let completed = AtomicUsize::new(0);
        let failures = AtomicUsize::new(0);
        info!(
            target: "neurograph-pipeline",
            "Starting {} of {} subjects on {} threads",
            stage.name(),
            total,
            self.threads()
        );

        let results: Vec<PipelineResult<StageReport>> = self.pool.install(|| {
            subjects
                .par_iter()
                .map(|subject| {
                    let result = task(subject);
                    if let Err(e) = &result {
                        failures.fetch_add(1, Ordering::Relaxed);
                        error!(
                            target: "neurograph-pipeline",
                            "{} failed for {}: {}",
                            stage.name(),
                            subject,
                            e
                        );
                    }
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % self.progress_interval == 0 && done < total {
                        let elapsed = start.elapsed();
                        let remaining = elapsed.mul_f64((total - done) as f64 / done as f64);
                        info!(
                            target: "neurograph-pipeline",
                            "Progress: {}/{} ({:.1}%), {} failed, {:.1} minutes elapsed, ~{:.1} minutes remaining",
                            done,
                            total,
                            done as f64 / total as f64 * 100.0,
                            failures.load(Ordering::Relaxed),
                            minutes(elapsed),
                            minutes(remaining)
                        );
                    }
                    result
                })
                .collect()
        });

        let mut outcome = BatchOutcome {
            stage,
            successful: Vec::new(),
            failed: Vec::new(),
            errors: Vec::new(),
            reports: Vec::new(),
            elapsed: start.elapsed(),
        };
        for (subject, result) in subjects.iter().zip(results) {
            match result {
                Ok(report) => {
                    outcome.successful.push(subject.clone());
                    outcome.reports.push(report);
                }
                Err(e) => {
                    outcome.failed.push(subject.clone());
                    outcome.errors.push((subject.clone(), e.to_string()));
                }
            }
        }
        info!(
            target: "neurograph-pipeline",
            "{} complete: {}/{} successful, {} failed, {:.1} minutes",
            stage.name(),
            outcome.successful.len(),
            total,
            outcome.failed.len(),
            minutes(outcome.elapsed)
        );
        outcome
    }
}

/// Subjects a batch stage should process
pub fn subjects_for(ctx: &PipelineContext, stage: Stage) -> PipelineResult<Vec<String>> {
    match stage.previous() {
        None => {
            let cohort = Cohort::load(ctx.layout.phenotypic_file(), &ctx.config.cohort)?;
            Ok(cohort.analysis_subjects())
        }
        Some(previous) => {
            let log = ctx.layout.run_log(previous);
            if !log.exists() {
                return Err(PipelineError::MissingInput(log));
            }
            let subjects = read_successful_subjects(&log)?;
            info!(
                target: "neurograph-pipeline",
                "Found {} successful subjects in {}",
                subjects.len(),
                log.display()
            );
            Ok(subjects)
        }
    }
}

fn stage_fields(ctx: &PipelineContext, stage: Stage, log: RunLog) -> RunLog {
    match stage {
        Stage::Preprocess => log,
        Stage::Extract => log.field("Atlas", &ctx.config.extraction.atlas_name),
        Stage::Connectivity => {
            let size = read_labels(&ctx.layout.timeseries_labels())
                .map(|labels| format!("{0}x{0}", labels.len()))
                .unwrap_or_else(|_| "unknown".to_string());
            log.field(
                "Matrix size",
                format!("{} ({})", size, ctx.config.extraction.atlas_name),
            )
        }
        Stage::Metrics => {
            let g = &ctx.config.graph;
            let threshold = match g.threshold {
                neurograph_config::ThresholdKind::Proportional => {
                    format!("proportional, density {}", g.density)
                }
                neurograph_config::ThresholdKind::Absolute => {
                    format!("absolute, min weight {}", g.min_weight)
                }
            };
            log.field("Threshold", threshold)
        }
    }
}

fn write_run_log(ctx: &PipelineContext, outcome: &BatchOutcome) -> PipelineResult<()> {
    let stage = outcome.stage;
    let mut log = stage_fields(ctx, stage, RunLog::new(stage.log_title()))
        .field("Total subjects", outcome.total())
        .field("Successful", outcome.successful.len())
        .field("Failed", outcome.failed.len())
        .field("Total time", format!("{:.1} minutes", minutes(outcome.elapsed)));
    log.successful = outcome.successful.clone();
    log.failed = outcome.failed.clone();

    let path = ctx.layout.run_log(stage);
    log.write(&path)?;
    info!(
        target: "neurograph-pipeline",
        "{} log saved to {}",
        stage.name(),
        path.display()
    );

    if stage == Stage::Preprocess {
        let failed_path = ctx.layout.failed_subjects();
        if outcome.failed.is_empty() {
            remove_stale(&failed_path)?;
        } else {
            write_failed_subjects(&failed_path, &outcome.failed)?;
            warn!(
                target: "neurograph-pipeline",
                "{} failed subjects listed in {}",
                outcome.failed.len(),
                failed_path.display()
            );
        }
    }
    Ok(())
}

/// Run one stage over `subjects` and write its run log
pub fn run_stage_for(
    ctx: &PipelineContext,
    runner: &BatchRunner,
    stage: Stage,
    subjects: &[String],
    figures: bool,
) -> PipelineResult<BatchOutcome> {
    if subjects.is_empty() {
        warn!(target: "neurograph-pipeline", "No subjects to process for {}", stage.name());
    }
    let outcome = match stage {
        Stage::Preprocess => runner.run(stage, subjects, |s| preprocess_subject(ctx, s)),
        Stage::Extract => {
            let extractor = Extractor::new(ctx)?;
            extractor.write_atlas_labels()?;
            runner.run(stage, subjects, |s| extractor.extract(s))
        }
        Stage::Connectivity => {
            runner.run(stage, subjects, |s| connectivity_subject(ctx, s, figures))
        }
        Stage::Metrics => runner.run(stage, subjects, |s| metrics_subject(ctx, s)),
    };

    write_run_log(ctx, &outcome)?;
    let verified = outcome.verify_outputs();
    info!(
        target: "neurograph-pipeline",
        "Output verification: {} files, {:.1} MB total",
        verified.files,
        verified.megabytes()
    );
    if verified.files != outcome.successful.len() {
        warn!(
            target: "neurograph-pipeline",
            "Expected {} output files, found {}",
            outcome.successful.len(),
            verified.files
        );
    }
    Ok(outcome)
}

/// Run one stage over the subjects its input log (or the cohort) names
pub fn run_stage(
    ctx: &PipelineContext,
    runner: &BatchRunner,
    stage: Stage,
    figures: bool,
) -> PipelineResult<BatchOutcome> {
    let subjects = subjects_for(ctx, stage)?;
    run_stage_for(ctx, runner, stage, &subjects, figures)
}

/// Outcome of a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub outcomes: Vec<BatchOutcome>,
    /// `None` when either group had too few subjects left
    pub comparison: Option<GroupComparison>,
}

/// Cohort summary, every batch stage in order, then the group comparison
pub fn run_pipeline(
    ctx: &PipelineContext,
    runner: &BatchRunner,
    figures: bool,
) -> PipelineResult<PipelineRun> {
    let cohort = Cohort::load(ctx.layout.phenotypic_file(), &ctx.config.cohort)?;
    cohort.write_summary(&ctx.layout.sample_summary())?;

    let mut outcomes = Vec::with_capacity(Stage::ALL.len());
    for stage in Stage::ALL {
        let outcome = run_stage(ctx, runner, stage, figures)?;
        let empty = outcome.successful.is_empty();
        outcomes.push(outcome);
        if empty {
            warn!(
                target: "neurograph-pipeline",
                "No subject survived {}; stopping",
                stage.name()
            );
            return Ok(PipelineRun {
                outcomes,
                comparison: None,
            });
        }
    }

    let comparison = match group_comparison(&cohort, &ctx.layout, &ctx.config.statistics) {
        Ok(c) => {
            c.write(
                &ctx.layout.group_comparison_json(),
                &ctx.layout.group_comparison_table(),
            )?;
            Some(c)
        }
        Err(PipelineError::InvalidCohort(reason)) => {
            warn!(target: "neurograph-pipeline", "Skipping group comparison: {}", reason);
            None
        }
        Err(e) => return Err(e),
    };
    Ok(PipelineRun {
        outcomes,
        comparison,
    })
}
