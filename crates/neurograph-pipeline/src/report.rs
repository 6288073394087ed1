// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Group comparison of graph metrics and connectivity heatmaps

use crate::cohort::{Cohort, Group};
use crate::error::{PipelineError, PipelineResult};
use crate::layout::DataLayout;
use crate::stages::SubjectMetrics;
use image::{ImageBuffer, Rgb};
use ndarray::Array2;
use neurograph_config::StatisticsConfig;
use neurograph_graph::{benjamini_hochberg, permutation_test, GlobalMetrics, PermutationResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

/// Fewest subjects per group for a comparison
pub const MIN_GROUP_SIZE: usize = 2;

/// Mean and sample standard deviation of one metric in one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupStats {
    pub n: usize,
    pub mean: f64,
    pub std: f64,
}

impl GroupStats {
    fn of(values: &[f64]) -> Self {
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self { n, mean, std }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: String,
    pub subthreshold: GroupStats,
    pub diagnosed: GroupStats,
    /// Subthreshold minus Diagnosed
    pub test: PermutationResult,
    /// Benjamini-Hochberg adjusted p-value across all metrics
    pub p_fdr: f64,
    pub significant: bool,
}

/// Subthreshold vs Diagnosed comparison of every global metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupComparison {
    pub subthreshold_subjects: Vec<String>,
    pub diagnosed_subjects: Vec<String>,
    pub permutations: usize,
    pub seed: u64,
    pub alpha: f64,
    pub metrics: Vec<MetricComparison>,
}

fn load_group(cohort: &Cohort, group: Group, layout: &DataLayout) -> PipelineResult<Vec<SubjectMetrics>> {
    let mut out = Vec::new();
    let mut missing = 0usize;
    for subject in cohort.subjects_in(group) {
        let path = layout.metrics(&subject);
        if !path.exists() {
            missing += 1;
            continue;
        }
        out.push(SubjectMetrics::read(&path)?);
    }
    if missing > 0 {
        warn!(
            target: "neurograph-pipeline",
            "{} {} subjects have no metrics file and are left out",
            missing,
            group
        );
    }
    Ok(out)
}

fn metric_values(records: &[SubjectMetrics], name: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| r.metrics.global.get(name))
        .filter(|v| v.is_finite())
        .collect()
}

/// Compare groups on every metric in [`GlobalMetrics::NAMES`]
pub fn group_comparison(
    cohort: &Cohort,
    layout: &DataLayout,
    cfg: &StatisticsConfig,
) -> PipelineResult<GroupComparison> {
    let sub = load_group(cohort, Group::Subthreshold, layout)?;
    let diag = load_group(cohort, Group::Diagnosed, layout)?;
    for (group, records) in [(Group::Subthreshold, &sub), (Group::Diagnosed, &diag)] {
        if records.len() < MIN_GROUP_SIZE {
            return Err(PipelineError::InvalidCohort(format!(
                "{} group has {} subjects with metrics, at least {} needed",
                group,
                records.len(),
                MIN_GROUP_SIZE
            )));
        }
    }
    info!(
        target: "neurograph-pipeline",
        "Comparing {} Subthreshold and {} Diagnosed subjects ({} permutations)",
        sub.len(),
        diag.len(),
        cfg.permutations
    );

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut rows = Vec::with_capacity(GlobalMetrics::NAMES.len());
    for name in GlobalMetrics::NAMES {
        let a = metric_values(&sub, name);
        let b = metric_values(&diag, name);
        let test = permutation_test(&a, &b, cfg.permutations, &mut rng)?;
        rows.push((name, GroupStats::of(&a), GroupStats::of(&b), test));
    }

    let p: Vec<f64> = rows.iter().map(|r| r.3.p_value).collect();
    let adjusted = benjamini_hochberg(&p);
    let metrics = rows
        .into_iter()
        .zip(adjusted)
        .map(|((name, s, d, test), p_fdr)| MetricComparison {
            metric: name.to_string(),
            subthreshold: s,
            diagnosed: d,
            test,
            p_fdr,
            significant: p_fdr < cfg.alpha,
        })
        .collect();

    Ok(GroupComparison {
        subthreshold_subjects: sub.into_iter().map(|r| r.subject).collect(),
        diagnosed_subjects: diag.into_iter().map(|r| r.subject).collect(),
        permutations: cfg.permutations,
        seed: cfg.seed,
        alpha: cfg.alpha,
        metrics,
    })
}

impl GroupComparison {
    pub fn significant(&self) -> impl Iterator<Item = &MetricComparison> {
        self.metrics.iter().filter(|m| m.significant)
    }

    /// Fixed-width text table, one row per metric
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "GRAPH METRICS: SUBTHRESHOLD vs DIAGNOSED");
        let _ = writeln!(
            out,
            "Subthreshold: {}  Diagnosed: {}  Permutations: {}  FDR alpha: {}",
            self.subthreshold_subjects.len(),
            self.diagnosed_subjects.len(),
            self.permutations,
            self.alpha
        );
        out.push('\n');
        let _ = writeln!(
            out,
            "{:<28} {:>18} {:>18} {:>8} {:>8} {:>8}",
            "metric", "subthreshold", "diagnosed", "t", "p", "p_fdr"
        );
        for m in &self.metrics {
            let _ = writeln!(
                out,
                "{:<28} {:>18} {:>18} {:>8.3} {:>8.4} {:>8.4}{}",
                m.metric,
                format!("{:.4} ± {:.4}", m.subthreshold.mean, m.subthreshold.std),
                format!("{:.4} ± {:.4}", m.diagnosed.mean, m.diagnosed.std),
                m.test.t_statistic,
                m.test.p_value,
                m.p_fdr,
                if m.significant { " *" } else { "" }
            );
        }
        out
    }

    /// Write the JSON and text forms, creating parent directories
    pub fn write(&self, json_path: &Path, table_path: &Path) -> PipelineResult<()> {
        for path in [json_path, table_path] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        std::fs::write(json_path, serde_json::to_string_pretty(self)?)?;
        std::fs::write(table_path, self.render_table())?;
        info!(
            target: "neurograph-pipeline",
            "Group comparison saved to {} and {}",
            json_path.display(),
            table_path.display()
        );
        Ok(())
    }
}

/// Reversed RdBu palette: -1 is dark blue, 0 near white, +1 dark red
const DIVERGING: [[u8; 3]; 11] = [
    [5, 48, 97],
    [33, 102, 172],
    [67, 147, 195],
    [146, 197, 222],
    [209, 229, 240],
    [247, 247, 247],
    [253, 219, 199],
    [244, 165, 130],
    [214, 96, 77],
    [178, 24, 43],
    [103, 0, 31],
];

const NAN_COLOR: [u8; 3] = [128, 128, 128];

/// Colour of `value` on the diverging map over `[-1, 1]`
pub fn diverging_color(value: f64) -> [u8; 3] {
    if value.is_nan() {
        return NAN_COLOR;
    }
    let pos = (value.clamp(-1.0, 1.0) + 1.0) / 2.0 * (DIVERGING.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(DIVERGING.len() - 1);
    let frac = pos - lo as f64;
    let mut rgb = [0u8; 3];
    for (c, out) in rgb.iter_mut().enumerate() {
        let a = DIVERGING[lo][c] as f64;
        let b = DIVERGING[hi][c] as f64;
        *out = (a + (b - a) * frac).round() as u8;
    }
    rgb
}

/// Save a square matrix as a PNG heatmap, `cell_size` pixels per entry
pub fn render_heatmap(matrix: &Array2<f64>, path: &Path, cell_size: u32) -> PipelineResult<()> {
    let (rows, cols) = matrix.dim();
    if rows == 0 || rows != cols {
        return Err(PipelineError::InvalidShape(format!(
            "heatmap {} needs a non-empty square matrix, got {}x{}",
            path.display(),
            rows,
            cols
        )));
    }
    let cell = cell_size.max(1);
    let side = rows as u32 * cell;
    let img = ImageBuffer::from_fn(side, side, |x, y| {
        let (i, j) = ((y / cell) as usize, (x / cell) as usize);
        Rgb(diverging_color(matrix[[i, j]]))
    });
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    img.save(path)?;
    Ok(())
}
