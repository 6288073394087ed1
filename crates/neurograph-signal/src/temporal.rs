// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-signal temporal operations
//!
//! The `*_series` functions work on one contiguous signal; the matrix
//! versions apply them to every column of a `time × series` array.

use ndarray::{Array2, Axis};

/// Remove the least-squares line (mean and slope) from a signal
pub fn detrend_series(signal: &mut [f64]) {
    let n = signal.len();
    if n == 0 {
        return;
    }
    let mean = signal.iter().sum::<f64>() / n as f64;
    let centre = (n as f64 - 1.0) / 2.0;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (i, v) in signal.iter().enumerate() {
        let x = i as f64 - centre;
        sxx += x * x;
        sxy += x * (v - mean);
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    for (i, v) in signal.iter_mut().enumerate() {
        *v -= mean + slope * (i as f64 - centre);
    }
}

/// Subtract the mean and divide by the population standard deviation
///
/// Signals whose deviation is below `f64::EPSILON` are only centred.
pub fn standardize_series(signal: &mut [f64]) {
    let n = signal.len();
    if n == 0 {
        return;
    }
    let mean = signal.iter().sum::<f64>() / n as f64;
    let var = signal.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    let std = var.sqrt();
    let scale = if std < f64::EPSILON { 1.0 } else { std };
    for v in signal.iter_mut() {
        *v = (*v - mean) / scale;
    }
}

/// Replace NaN and ±Inf with 0, returning how many values were replaced
pub fn ensure_finite_series(signal: &mut [f64]) -> usize {
    let mut replaced = 0;
    for v in signal.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
            replaced += 1;
        }
    }
    replaced
}

/// Apply `f` to every column of a `time × series` matrix
pub(crate) fn for_each_column<F>(signals: &mut Array2<f64>, mut f: F)
where
    F: FnMut(&mut [f64]),
{
    let mut buffer = vec![0.0; signals.nrows()];
    for mut column in signals.axis_iter_mut(Axis(1)) {
        for (dst, src) in buffer.iter_mut().zip(column.iter()) {
            *dst = *src;
        }
        f(&mut buffer);
        for (dst, src) in column.iter_mut().zip(buffer.iter()) {
            *dst = *src;
        }
    }
}

/// Linear detrend of every column
pub fn detrend(signals: &mut Array2<f64>) {
    for_each_column(signals, detrend_series);
}

/// Z-score every column
pub fn standardize_zscore(signals: &mut Array2<f64>) {
    for_each_column(signals, standardize_series);
}

/// Replace non-finite values in every column, returning the total replaced
pub fn ensure_finite(signals: &mut Array2<f64>) -> usize {
    let mut replaced = 0;
    for_each_column(signals, |s| replaced += ensure_finite_series(s));
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_detrend_removes_line() {
        let mut signal: Vec<f64> = (0..20).map(|i| 3.0 + 0.5 * i as f64).collect();
        detrend_series(&mut signal);
        for v in signal {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_detrend_keeps_residual() {
        // The alternating component survives, the line does not
        let mut signal: Vec<f64> = (0..8)
            .map(|i| 1.0 + 2.0 * i as f64 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        detrend_series(&mut signal);
        let mean = signal.iter().sum::<f64>() / 8.0;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
        assert!(signal[0] > 0.0 && signal[1] < 0.0);
    }

    #[test]
    fn test_standardize() {
        let mut signal = vec![1.0, 2.0, 3.0, 4.0];
        standardize_series(&mut signal);
        let mean = signal.iter().sum::<f64>() / 4.0;
        let var = signal.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_standardize_constant_signal_is_centred() {
        let mut signal = vec![5.0; 6];
        standardize_series(&mut signal);
        assert!(signal.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_matrix_columns_independent() {
        let mut m = array![[1.0, 10.0], [2.0, 10.0], [3.0, f64::NAN]];
        assert_eq!(ensure_finite(&mut m), 1);
        assert_eq!(m[[2, 1]], 0.0);

        standardize_zscore(&mut m);
        assert_abs_diff_eq!(m[[0, 0]], -(1.5f64).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(m.column(1).sum(), 0.0, epsilon = 1e-12);
    }
}
