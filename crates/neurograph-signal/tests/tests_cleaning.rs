//! End-to-end cleaning of a synthetic BOLD run
//!
//! Builds a small 4-D volume whose voxels carry a slow oscillation plus drift
//! and fast noise, then runs the same chain the preprocessing stage does.

use approx::assert_abs_diff_eq;
use ndarray::{Array4, Axis};
use neurograph_signal::{
    clean_volume, smooth_volume, volume_stats, voxel_sizes_from_affine, CleanOptions,
};
use std::f64::consts::PI;

const T_R: f64 = 2.0;

fn synthetic_run(n_timepoints: usize) -> Array4<f32> {
    Array4::from_shape_fn((6, 6, 4, n_timepoints), |(x, y, z, t)| {
        let time = t as f64 * T_R;
        let slow = (2.0 * PI * 0.04 * time + x as f64 * 0.3).sin();
        let fast = 0.5 * (2.0 * PI * 0.2 * time).sin();
        let drift = 0.05 * t as f64;
        (1000.0 + 10.0 * (y + z) as f64 + slow + fast + drift) as f32
    })
}

#[test]
fn test_cleaned_voxels_are_standardized() {
    let mut data = synthetic_run(120);
    let replaced = clean_volume(&mut data, &CleanOptions::default()).unwrap();
    assert_eq!(replaced, 0);

    for lane in data.lanes(Axis(3)) {
        let n = lane.len() as f64;
        let mean = lane.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = lane.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-3);
    }
}

#[test]
fn test_smoothing_after_cleaning_stays_finite() {
    let mut data = synthetic_run(40);
    data[[2, 2, 2, 5]] = f32::NAN;
    let replaced = clean_volume(&mut data, &CleanOptions::default()).unwrap();
    assert_eq!(replaced, 1);

    let affine = [
        [3.0, 0.0, 0.0, -90.0],
        [0.0, 3.0, 0.0, -126.0],
        [0.0, 0.0, 3.0, -72.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    smooth_volume(&mut data, 6.0, voxel_sizes_from_affine(&affine)).unwrap();

    let stats = volume_stats(&data);
    assert!(stats.is_finite());
    assert!(stats.max <= 4.0 && stats.min >= -4.0, "{}", stats);
}
