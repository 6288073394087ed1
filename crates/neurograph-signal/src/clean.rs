// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Temporal cleaning chain
//!
//! Steps run in a fixed order: non-finite replacement, linear detrend,
//! Butterworth band-pass, z-score. Each step can be switched off.

use crate::butterworth::ButterworthBandpass;
use crate::error::{SignalError, SignalResult};
use crate::temporal::{
    detrend_series, ensure_finite_series, for_each_column, standardize_series,
};
use ndarray::{Array2, Array4, Axis, Zip};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Fewest timepoints a signal needs before detrending and filtering mean anything
pub const MIN_TIMEPOINTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct CleanOptions {
    /// Repetition time in seconds
    pub t_r: f64,
    pub detrend: bool,
    pub standardize: bool,
    pub low_pass: Option<f64>,
    pub high_pass: Option<f64>,
    pub filter_order: usize,
    pub ensure_finite: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            t_r: 2.0,
            detrend: true,
            standardize: true,
            low_pass: Some(0.1),
            high_pass: Some(0.01),
            filter_order: 5,
            ensure_finite: true,
        }
    }
}

impl CleanOptions {
    /// Options that only replace non-finite values and z-score
    pub fn standardize_only() -> Self {
        Self {
            detrend: false,
            low_pass: None,
            high_pass: None,
            ..Self::default()
        }
    }

    pub fn design_filter(&self) -> SignalResult<ButterworthBandpass> {
        ButterworthBandpass::new(self.filter_order, self.low_pass, self.high_pass, self.t_r)
    }
}

/// Clean a single signal with an already designed filter
///
/// Returns the number of non-finite values that were replaced.
pub fn clean_series(signal: &mut [f64], opts: &CleanOptions, filter: &ButterworthBandpass) -> usize {
    let replaced = if opts.ensure_finite {
        ensure_finite_series(signal)
    } else {
        0
    };
    if opts.detrend {
        detrend_series(signal);
    }
    filter.filtfilt(signal);
    if opts.standardize {
        standardize_series(signal);
    }
    replaced
}

fn check_length(n_timepoints: usize) -> SignalResult<()> {
    if n_timepoints < MIN_TIMEPOINTS {
        return Err(SignalError::TooShort {
            length: n_timepoints,
            minimum: MIN_TIMEPOINTS,
        });
    }
    Ok(())
}

/// Clean every column of a `time × series` matrix
pub fn clean_signals(signals: &mut Array2<f64>, opts: &CleanOptions) -> SignalResult<usize> {
    check_length(signals.nrows())?;
    let filter = opts.design_filter()?;
    let mut replaced = 0;
    for_each_column(signals, |s| replaced += clean_series(s, opts, &filter));
    Ok(replaced)
}

/// Clean the time course of every voxel of an `[x, y, z, t]` volume in parallel
pub fn clean_volume(data: &mut Array4<f32>, opts: &CleanOptions) -> SignalResult<usize> {
    let n_timepoints = data.len_of(Axis(3));
    check_length(n_timepoints)?;
    let filter = opts.design_filter()?;
    let replaced = AtomicUsize::new(0);

    Zip::from(data.lanes_mut(Axis(3))).par_for_each(|mut lane| {
        let mut buffer: Vec<f64> = lane.iter().map(|&v| v as f64).collect();
        let n = clean_series(&mut buffer, opts, &filter);
        if n > 0 {
            replaced.fetch_add(n, Ordering::Relaxed);
        }
        for (dst, src) in lane.iter_mut().zip(buffer.iter()) {
            *dst = *src as f32;
        }
    });

    let replaced = replaced.into_inner();
    let (nx, ny, nz, _) = data.dim();
    debug!(
        target: "neurograph-signal",
        "Cleaned {} voxel time courses of {} timepoints ({} non-finite values replaced)",
        nx * ny * nz,
        n_timepoints,
        replaced
    );
    Ok(replaced)
}
