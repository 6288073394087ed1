// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pearson correlation and Fisher z matrices

use crate::error::{ConnectivityError, ConnectivityResult};
use ndarray::{Array2, Axis};

/// Correlations are clipped to `±DEFAULT_CLIP` before `atanh`
pub const DEFAULT_CLIP: f64 = 0.9999;

/// Pearson correlation between the columns of a `time × region` matrix
///
/// A constant column has no variance and yields NaN in its row and column.
pub fn correlation_matrix(ts: &Array2<f64>) -> ConnectivityResult<Array2<f64>> {
    let n = ts.nrows();
    if n < 2 {
        return Err(ConnectivityError::TooFewTimepoints {
            actual: n,
            minimum: 2,
        });
    }
    let mean = ts
        .mean_axis(Axis(0))
        .ok_or(ConnectivityError::TooFewTimepoints { actual: 0, minimum: 2 })?;
    let centred = ts - &mean.insert_axis(Axis(0));
    let cov = centred.t().dot(&centred);

    let scale: Vec<f64> = cov.diag().iter().map(|v| v.sqrt()).collect();
    let mut r = cov;
    for ((i, j), v) in r.indexed_iter_mut() {
        let value = *v / (scale[i] * scale[j]);
        *v = if value.is_nan() { value } else { value.clamp(-1.0, 1.0) };
    }
    Ok(r)
}

/// `atanh` of clipped correlations with a zeroed diagonal
pub fn fisher_z(r: &Array2<f64>, clip: f64) -> ConnectivityResult<Array2<f64>> {
    if !(clip > 0.0 && clip < 1.0) {
        return Err(ConnectivityError::InvalidParameter(format!(
            "correlation clip must lie in (0, 1), got {}",
            clip
        )));
    }
    if !r.is_square() {
        return Err(ConnectivityError::ShapeMismatch(format!(
            "correlation matrix must be square, got {:?}",
            r.dim()
        )));
    }
    let mut z = r.mapv(|v| v.clamp(-clip, clip).atanh());
    z.diag_mut().fill(0.0);
    Ok(z)
}
