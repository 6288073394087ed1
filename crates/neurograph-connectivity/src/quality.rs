// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pass/fail checks recorded for every extracted subject

use ndarray::Array2;
use std::fmt;

const RTOL: f64 = 1e-5;
const ATOL: f64 = 1e-8;

/// `|a - b| <= ATOL + RTOL * |b|`, false when either side is NaN
fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= ATOL + RTOL * b.abs()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSeriesQuality {
    pub no_nan: bool,
    pub no_inf: bool,
    /// Every region in the label list produced a column
    pub expected_regions: bool,
}

impl TimeSeriesQuality {
    pub fn passed(&self) -> bool {
        self.no_nan && self.no_inf
    }
}

pub fn check_timeseries(ts: &Array2<f64>, expected_regions: usize) -> TimeSeriesQuality {
    TimeSeriesQuality {
        no_nan: !ts.iter().any(|v| v.is_nan()),
        no_inf: !ts.iter().any(|v| v.is_infinite()),
        expected_regions: ts.ncols() == expected_regions,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityQuality {
    pub no_nan: bool,
    pub no_inf: bool,
    pub symmetric: bool,
    pub zero_diagonal: bool,
}

impl ConnectivityQuality {
    pub fn passed(&self) -> bool {
        self.no_nan && self.no_inf && self.symmetric && self.zero_diagonal
    }
}

pub fn check_connectivity(z: &Array2<f64>) -> ConnectivityQuality {
    let symmetric = z.is_square()
        && z
            .indexed_iter()
            .all(|((i, j), &v)| close(v, z[[j, i]]));
    ConnectivityQuality {
        no_nan: !z.iter().any(|v| v.is_nan()),
        no_inf: !z.iter().any(|v| v.is_infinite()),
        symmetric,
        zero_diagonal: z.diag().iter().all(|&v| close(v, 0.0)),
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "yes"
    } else {
        "NO"
    }
}

impl fmt::Display for TimeSeriesQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no NaN: {}, no Inf: {}, expected regions: {}",
            mark(self.no_nan),
            mark(self.no_inf),
            mark(self.expected_regions)
        )
    }
}

impl fmt::Display for ConnectivityQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no NaN: {}, no Inf: {}, symmetric: {}, zero diagonal: {}",
            mark(self.no_nan),
            mark(self.no_inf),
            mark(self.symmetric),
            mark(self.zero_diagonal)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_good_matrix_passes() {
        let z = array![[0.0, 0.5, -0.2], [0.5, 0.0, 0.1], [-0.2, 0.1, 0.0]];
        let q = check_connectivity(&z);
        assert!(q.passed());
        assert_eq!(
            q.to_string(),
            "no NaN: yes, no Inf: yes, symmetric: yes, zero diagonal: yes"
        );
    }

    #[test]
    fn test_each_failure() {
        let q = check_connectivity(&array![[0.0, f64::NAN], [f64::NAN, 0.0]]);
        assert!(!q.no_nan && !q.symmetric && !q.passed());

        let q = check_connectivity(&array![[0.0, 0.3], [0.2, 0.0]]);
        assert!(q.no_nan && !q.symmetric);

        let q = check_connectivity(&array![[1.0, 0.3], [0.3, 0.0]]);
        assert!(q.symmetric && !q.zero_diagonal);

        let q = check_connectivity(&array![[0.0, f64::INFINITY], [f64::INFINITY, 0.0]]);
        assert!(!q.no_inf);
    }

    #[test]
    fn test_timeseries_quality() {
        let ts = array![[0.1, 0.2], [0.3, 0.4]];
        assert!(check_timeseries(&ts, 2).expected_regions);
        let q = check_timeseries(&ts, 48);
        assert!(q.passed() && !q.expected_regions);
    }
}
