// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use ndarray::ArrayBase;
use ndarray::{Data, Dimension};
use std::fmt;

/// Summary of the values in an array, ignoring non-finite entries for the moments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    pub count: usize,
    pub nan_count: usize,
    pub inf_count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl VolumeStats {
    pub fn is_finite(&self) -> bool {
        self.nan_count == 0 && self.inf_count == 0
    }
}

impl fmt::Display for VolumeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} range=[{:.4}, {:.4}] mean={:.4} std={:.4} nan={} inf={}",
            self.count, self.min, self.max, self.mean, self.std, self.nan_count, self.inf_count
        )
    }
}

/// Compute [`VolumeStats`] for any float array
pub fn volume_stats<S, D>(data: &ArrayBase<S, D>) -> VolumeStats
where
    S: Data,
    S::Elem: Copy + Into<f64>,
    D: Dimension,
{
    let mut nan_count = 0;
    let mut inf_count = 0;
    let mut finite = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;

    for &v in data.iter() {
        let v: f64 = v.into();
        if v.is_nan() {
            nan_count += 1;
        } else if v.is_infinite() {
            inf_count += 1;
        } else {
            finite += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
            sum_sq += v * v;
        }
    }

    let (mean, std) = if finite == 0 {
        (f64::NAN, f64::NAN)
    } else {
        let mean = sum / finite as f64;
        let var = (sum_sq / finite as f64 - mean * mean).max(0.0);
        (mean, var.sqrt())
    };
    if finite == 0 {
        min = f64::NAN;
        max = f64::NAN;
    }

    VolumeStats {
        count: data.len(),
        nan_count,
        inf_count,
        min,
        max,
        mean,
        std,
    }
}
