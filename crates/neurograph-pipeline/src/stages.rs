// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Single-subject pipeline stages
//!
//! Each stage reads the previous stage's output for one subject, writes its
//! own output and returns a [`StageReport`]. Nothing here touches run logs;
//! that is the batch runner's job.

use crate::error::{PipelineError, PipelineResult};
use crate::layout::{DataLayout, Stage};
use crate::report::render_heatmap;
use neurograph_config::{GraphConfig, NeurographConfig, PreprocessingConfig, ThresholdKind};
use neurograph_connectivity::{
    check_connectivity, correlation_matrix, extract_region_signals, fisher_z,
    resample_labels_nearest, Affine, Atlas,
};
use neurograph_graph::{compute_metrics_with, threshold, CommunityOptions, GraphMetrics, ThresholdMode};
use neurograph_io::{read_labels, read_nifti, read_npy, write_labels, write_nifti, write_npy, NiftiImage, RegionLabel};
use neurograph_signal::{clean_volume, smooth_volume, voxel_sizes_from_affine, volume_stats, CleanOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Relative difference between header and configured TR worth a warning
const TR_MISMATCH_TOLERANCE: f64 = 0.01;

/// Configuration plus the resolved data layout, shared by every stage
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub config: NeurographConfig,
    pub layout: DataLayout,
}

impl PipelineContext {
    pub fn new(config: NeurographConfig) -> Self {
        let layout = DataLayout::new(&config.paths, &config.extraction);
        Self { config, layout }
    }
}

/// What one stage produced for one subject
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub subject: String,
    pub stage: Stage,
    pub output: PathBuf,
    /// Size of `output` in bytes
    pub bytes: u64,
}

impl StageReport {
    fn new(subject: &str, stage: Stage, output: PathBuf) -> Self {
        let bytes = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
        Self {
            subject: subject.to_string(),
            stage,
            output,
            bytes,
        }
    }
}

fn require(path: &Path) -> PipelineResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::MissingInput(path.to_path_buf()))
    }
}

/// Remove a file left by an earlier run; absent is fine
pub(crate) fn remove_stale(path: &Path) -> PipelineResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(target: "neurograph-pipeline", "Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn ensure_parent(path: &Path) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn clean_options(cfg: &PreprocessingConfig) -> CleanOptions {
    CleanOptions {
        t_r: cfg.t_r,
        detrend: cfg.detrend,
        standardize: cfg.standardize,
        low_pass: cfg.low_pass,
        high_pass: cfg.high_pass,
        filter_order: cfg.filter_order,
        ensure_finite: cfg.ensure_finite,
    }
}

pub fn threshold_mode(cfg: &GraphConfig) -> ThresholdMode {
    match cfg.threshold {
        ThresholdKind::Proportional => ThresholdMode::Proportional {
            density: cfg.density,
        },
        ThresholdKind::Absolute => ThresholdMode::Absolute {
            min_weight: cfg.min_weight,
        },
    }
}

/// Clean, smooth and save one raw BOLD run
pub fn preprocess_subject(ctx: &PipelineContext, subject: &str) -> PipelineResult<StageReport> {
    let cfg = &ctx.config.preprocessing;
    let input = ctx.layout.raw_bold(subject);
    require(&input)?;

    let img = read_nifti(&input)?;
    info!(
        target: "neurograph-pipeline",
        "[{}] Loaded {} with shape {:?}",
        subject,
        input.display(),
        img.shape()
    );
    if let Some(header_tr) = img.header.repetition_time() {
        if (header_tr - cfg.t_r).abs() > TR_MISMATCH_TOLERANCE * cfg.t_r {
            warn!(
                target: "neurograph-pipeline",
                "[{}] Header TR {:.3}s differs from configured TR {:.3}s; using the configured value",
                subject,
                header_tr,
                cfg.t_r
            );
        }
    }

    let NiftiImage { header, mut data } = img;
    let replaced = clean_volume(&mut data, &clean_options(cfg))?;
    if replaced > 0 {
        warn!(
            target: "neurograph-pipeline",
            "[{}] Replaced {} non-finite values before filtering",
            subject,
            replaced
        );
    }
    if cfg.smoothing_fwhm > 0.0 {
        smooth_volume(
            &mut data,
            cfg.smoothing_fwhm,
            voxel_sizes_from_affine(&header.affine()),
        )?;
    }

    let stats = volume_stats(&data);
    info!(target: "neurograph-pipeline", "[{}] Quality check: {}", subject, stats);
    if !stats.is_finite() {
        warn!(
            target: "neurograph-pipeline",
            "[{}] Found NaN or Inf values in the preprocessed data",
            subject
        );
    }

    let output = ctx.layout.preprocessed(subject);
    ensure_parent(&output)?;
    write_nifti(&output, &NiftiImage::from_array(data, &header))?;
    let report = StageReport::new(subject, Stage::Preprocess, output);
    info!(
        target: "neurograph-pipeline",
        "[{}] Saved {} ({:.1} MB)",
        subject,
        report.output.display(),
        report.bytes as f64 / 1e6
    );
    Ok(report)
}

/// Atlas-based extraction, sharing one loaded atlas across subjects
pub struct Extractor<'a> {
    ctx: &'a PipelineContext,
    atlas: Atlas,
}

impl<'a> Extractor<'a> {
    /// Load the configured atlas and its labels
    pub fn new(ctx: &'a PipelineContext) -> PipelineResult<Self> {
        let img_path = ctx.layout.atlas_path();
        let labels_path = ctx.layout.atlas_labels_path();
        require(img_path)?;
        require(labels_path)?;
        let atlas = Atlas::load(img_path, labels_path)?;
        Ok(Self::with_atlas(ctx, atlas))
    }

    pub fn with_atlas(ctx: &'a PipelineContext, atlas: Atlas) -> Self {
        Self { ctx, atlas }
    }

    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    /// Write `0: Background` and every atlas region to the shared label file
    pub fn write_atlas_labels(&self) -> PipelineResult<PathBuf> {
        let path = self.ctx.layout.timeseries_labels();
        write_labels(&path, &with_background(&self.atlas.labels))?;
        debug!(
            target: "neurograph-pipeline",
            "{} region labels written to {}",
            self.atlas.labels.len(),
            path.display()
        );
        Ok(path)
    }

    /// Mean time series of every atlas region for one preprocessed run
    pub fn extract(&self, subject: &str) -> PipelineResult<StageReport> {
        let input = self.ctx.layout.preprocessed(subject);
        require(&input)?;
        let img = read_nifti(&input)?;
        let [nx, ny, nz, _] = img.shape();

        let labels = resample_labels_nearest(
            &self.atlas,
            [nx, ny, nz],
            &Affine::from(img.header.affine()),
        )?;
        let ts = extract_region_signals(
            &img.data,
            &labels,
            &self.atlas.labels,
            self.ctx.config.extraction.standardize,
        )?;

        let quality = ts.quality();
        info!(
            target: "neurograph-pipeline",
            "[{}] Time series {} x {}: {}",
            subject,
            ts.n_timepoints(),
            ts.n_regions(),
            quality
        );
        if !quality.passed() {
            return Err(PipelineError::QualityCheck {
                subject: subject.to_string(),
                detail: quality.to_string(),
            });
        }
        if !quality.expected_regions {
            let names: Vec<&str> = ts.missing.iter().map(|r| r.name.as_str()).collect();
            warn!(
                target: "neurograph-pipeline",
                "[{}] Regions without voxels: {}",
                subject,
                names.join(", ")
            );
        }

        let output = self.ctx.layout.timeseries(subject);
        ensure_parent(&output)?;
        write_npy(&output, &ts.data)?;

        // Subjects missing regions get their own column list; a complete
        // subject uses the shared atlas list
        let subject_labels = self.ctx.layout.timeseries_subject_labels(subject);
        if ts.missing.is_empty() {
            remove_stale(&subject_labels)?;
        } else {
            write_labels(&subject_labels, &with_background(&ts.regions))?;
        }

        Ok(StageReport::new(subject, Stage::Extract, output))
    }
}

fn with_background(regions: &[RegionLabel]) -> Vec<RegionLabel> {
    let mut lines = Vec::with_capacity(regions.len() + 1);
    lines.push(RegionLabel::new(0, "Background"));
    lines.extend(regions.iter().cloned());
    lines
}

/// Extract one subject without keeping the atlas around
pub fn extract_subject(ctx: &PipelineContext, subject: &str) -> PipelineResult<StageReport> {
    let extractor = Extractor::new(ctx)?;
    extractor.write_atlas_labels()?;
    extractor.extract(subject)
}

/// Pearson correlation and Fisher z of one subject's region time series
pub fn connectivity_subject(
    ctx: &PipelineContext,
    subject: &str,
    figure: bool,
) -> PipelineResult<StageReport> {
    let cfg = &ctx.config.connectivity;
    let input = ctx.layout.timeseries(subject);
    require(&input)?;
    let ts = read_npy(&input)?;
    debug!(
        target: "neurograph-pipeline",
        "[{}] Loaded time series: {} timepoints, {} regions",
        subject,
        ts.nrows(),
        ts.ncols()
    );

    let r = correlation_matrix(&ts)?;
    let z = fisher_z(&r, cfg.correlation_clip)?;
    let quality = check_connectivity(&z);
    info!(
        target: "neurograph-pipeline",
        "[{}] Connectivity {} x {}: {}",
        subject,
        z.nrows(),
        z.ncols(),
        quality
    );
    if !quality.passed() {
        return Err(PipelineError::QualityCheck {
            subject: subject.to_string(),
            detail: quality.to_string(),
        });
    }

    let output = ctx.layout.connectivity(subject);
    ensure_parent(&output)?;
    write_npy(&output, &z)?;

    if figure || cfg.save_figures {
        let path = ctx.layout.figure(subject);
        render_heatmap(&z, &path, cfg.figure_cell_size)?;
        debug!(
            target: "neurograph-pipeline",
            "[{}] Heatmap saved to {}",
            subject,
            path.display()
        );
    }

    Ok(StageReport::new(subject, Stage::Connectivity, output))
}

/// Per-subject metrics file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectMetrics {
    pub subject: String,
    /// Region names in node order, empty when no label file was found
    pub regions: Vec<String>,
    pub threshold: ThresholdMode,
    pub absolute_values: bool,
    pub metrics: GraphMetrics,
}

impl SubjectMetrics {
    pub fn read(path: &Path) -> PipelineResult<Self> {
        require(path)?;
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn region_names(layout: &DataLayout, subject: &str, n_nodes: usize) -> Vec<String> {
    let own = layout.timeseries_subject_labels(subject);
    let path = if own.exists() { own } else { layout.timeseries_labels() };
    match read_labels(&path) {
        Ok(labels) if labels.len() == n_nodes => labels.into_iter().map(|l| l.name).collect(),
        Ok(labels) => {
            warn!(
                target: "neurograph-pipeline",
                "{} lists {} regions but the matrix has {} nodes",
                path.display(),
                labels.len(),
                n_nodes
            );
            Vec::new()
        }
        Err(_) => Vec::new(),
    }
}

/// Threshold one connectivity matrix and compute its graph metrics
pub fn metrics_subject(ctx: &PipelineContext, subject: &str) -> PipelineResult<StageReport> {
    let cfg = &ctx.config.graph;
    let input = ctx.layout.connectivity(subject);
    require(&input)?;
    let z = read_npy(&input)?;

    let mode = threshold_mode(cfg);
    let graph = threshold(&z, mode, cfg.absolute_values)?;
    let metrics = compute_metrics_with(
        &graph,
        &CommunityOptions {
            resolution: cfg.resolution,
            seed: cfg.seed,
        },
    );
    info!(
        target: "neurograph-pipeline",
        "[{}] {} edges, clustering {:.3}, efficiency {:.3}, modularity {:.3}",
        subject,
        metrics.n_edges,
        metrics.global.mean_clustering,
        metrics.global.global_efficiency,
        metrics.global.modularity
    );

    let record = SubjectMetrics {
        subject: subject.to_string(),
        regions: region_names(&ctx.layout, subject, metrics.n_nodes),
        threshold: mode,
        absolute_values: cfg.absolute_values,
        metrics,
    };
    let output = ctx.layout.metrics(subject);
    ensure_parent(&output)?;
    std::fs::write(&output, serde_json::to_string_pretty(&record)?)?;

    Ok(StageReport::new(subject, Stage::Metrics, output))
}
