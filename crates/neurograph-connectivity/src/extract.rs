// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Region-averaged time series

use crate::error::{ConnectivityError, ConnectivityResult};
use crate::quality::{check_timeseries, TimeSeriesQuality};
use ndarray::{Array2, Array3, Array4, Axis};
use neurograph_io::RegionLabel;
use neurograph_signal::standardize_zscore;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Mean signal of every atlas region, `time × region`
#[derive(Debug, Clone)]
pub struct RegionTimeSeries {
    pub data: Array2<f64>,
    /// Column order of `data`
    pub regions: Vec<RegionLabel>,
    /// Regions from the label list with no voxel in the image
    pub missing: Vec<RegionLabel>,
}

impl RegionTimeSeries {
    pub fn n_timepoints(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_regions(&self) -> usize {
        self.data.ncols()
    }

    pub fn quality(&self) -> TimeSeriesQuality {
        check_timeseries(&self.data, self.regions.len() + self.missing.len())
    }
}

/// Average `img` over the voxels of each region in `labels`
///
/// `labels` must already be on the image grid. Regions without voxels are
/// dropped from the output and listed in `missing`.
pub fn extract_region_signals(
    img: &Array4<f32>,
    labels: &Array3<u32>,
    regions: &[RegionLabel],
    standardize: bool,
) -> ConnectivityResult<RegionTimeSeries> {
    let (nx, ny, nz, nt) = img.dim();
    if labels.dim() != (nx, ny, nz) {
        return Err(ConnectivityError::ShapeMismatch(format!(
            "label grid {:?} does not match image grid {:?}",
            labels.dim(),
            (nx, ny, nz)
        )));
    }

    let column_of: HashMap<u32, usize> = regions
        .iter()
        .enumerate()
        .map(|(i, r)| (r.index, i))
        .collect();

    let mut counts = vec![0usize; regions.len()];
    let mut members: Vec<((usize, usize, usize), usize)> = Vec::new();
    for (pos, label) in labels.indexed_iter() {
        if let Some(&col) = column_of.get(label) {
            counts[col] += 1;
            members.push((pos, col));
        }
    }

    let (kept, missing): (Vec<usize>, Vec<usize>) =
        (0..regions.len()).partition(|&col| counts[col] > 0);
    if kept.is_empty() {
        return Err(ConnectivityError::NoRegions);
    }
    if !missing.is_empty() {
        warn!(
            target: "neurograph-connectivity",
            "{} atlas regions have no voxels on this grid and are dropped",
            missing.len()
        );
    }

    // Per-timepoint sums, computed in parallel over volumes
    let rows: Vec<Vec<f64>> = (0..nt)
        .into_par_iter()
        .map(|t| {
            let volume = img.index_axis(Axis(3), t);
            let mut sums = vec![0.0; regions.len()];
            for &(pos, col) in &members {
                sums[col] += volume[pos] as f64;
            }
            sums
        })
        .collect();

    let mut data = Array2::<f64>::zeros((nt, kept.len()));
    for (t, sums) in rows.iter().enumerate() {
        for (out_col, &col) in kept.iter().enumerate() {
            data[[t, out_col]] = sums[col] / counts[col] as f64;
        }
    }
    if standardize {
        standardize_zscore(&mut data);
    }

    debug!(
        target: "neurograph-connectivity",
        "Extracted {} regions × {} timepoints from {} labelled voxels",
        kept.len(),
        nt,
        members.len()
    );

    Ok(RegionTimeSeries {
        data,
        regions: kept.iter().map(|&c| regions[c].clone()).collect(),
        missing: missing.iter().map(|&c| regions[c].clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn labels_2x2x1() -> Array3<u32> {
        let mut labels = Array3::<u32>::zeros((2, 2, 1));
        labels[[0, 0, 0]] = 1;
        labels[[0, 1, 0]] = 1;
        labels[[1, 0, 0]] = 3;
        labels
    }

    fn regions() -> Vec<RegionLabel> {
        vec![
            RegionLabel::new(1, "A"),
            RegionLabel::new(2, "B"),
            RegionLabel::new(3, "C"),
        ]
    }

    #[test]
    fn test_region_means_and_missing() {
        let img = Array4::from_shape_fn((2, 2, 1, 3), |(x, y, _, t)| (10 * x + y + t) as f32);
        let ts = extract_region_signals(&img, &labels_2x2x1(), &regions(), false).unwrap();

        assert_eq!(ts.n_timepoints(), 3);
        assert_eq!(ts.n_regions(), 2);
        assert_eq!(ts.regions.iter().map(|r| r.index).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(ts.missing, vec![RegionLabel::new(2, "B")]);

        // Region 1 = voxels (0,0) and (0,1): mean 0.5 + t
        assert_abs_diff_eq!(ts.data[[2, 0]], 2.5, epsilon = 1e-12);
        // Region 3 = voxel (1,0): 10 + t
        assert_abs_diff_eq!(ts.data[[1, 1]], 11.0, epsilon = 1e-12);
        assert!(!ts.quality().expected_regions);
    }

    #[test]
    fn test_standardized_columns() {
        let img = Array4::from_shape_fn((2, 2, 1, 5), |(x, _, _, t)| ((x + 1) * t * t) as f32);
        let ts = extract_region_signals(&img, &labels_2x2x1(), &regions(), true).unwrap();
        for col in ts.data.columns() {
            assert_abs_diff_eq!(col.sum(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_errors() {
        let img = Array4::<f32>::zeros((3, 2, 1, 4));
        assert!(matches!(
            extract_region_signals(&img, &labels_2x2x1(), &regions(), false),
            Err(ConnectivityError::ShapeMismatch(_))
        ));

        let img = Array4::<f32>::zeros((2, 2, 1, 4));
        let none = vec![RegionLabel::new(9, "Elsewhere")];
        assert!(matches!(
            extract_region_signals(&img, &labels_2x2x1(), &none, false),
            Err(ConnectivityError::NoRegions)
        ));
    }
}
