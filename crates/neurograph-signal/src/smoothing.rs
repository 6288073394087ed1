// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Gaussian spatial smoothing
//!
//! Kernels are sized from a FWHM in millimetres and the voxel size along
//! each axis. The 3-D filter is applied as three 1-D passes with
//! half-sample symmetric (`d c b a | a b c d`) boundaries.

use crate::error::{SignalError, SignalResult};
use ndarray::parallel::prelude::*;
use ndarray::{Array4, ArrayViewMut3, Axis};
use tracing::debug;

/// Kernels extend this many standard deviations from the centre
pub const KERNEL_TRUNCATE: f64 = 4.0;

/// Standard deviation of a Gaussian with the given full width at half maximum
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / (8.0 * std::f64::consts::LN_2).sqrt()
}

/// Normalised 1-D Gaussian of radius `round(truncate * sigma)`
pub fn gaussian_kernel(sigma: f64, truncate: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (truncate * sigma + 0.5) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / denom).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

/// Voxel edge lengths from the column norms of an affine's 3×3 block
pub fn voxel_sizes_from_affine(affine: &[[f64; 4]; 4]) -> [f64; 3] {
    let mut sizes = [0.0; 3];
    for (j, size) in sizes.iter_mut().enumerate() {
        *size = (0..3).map(|i| affine[i][j] * affine[i][j]).sum::<f64>().sqrt();
    }
    sizes
}

#[inline]
fn reflect(i: isize, n: isize) -> usize {
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m < n { m } else { period - 1 - m }) as usize
}

fn convolve_into(input: &[f64], kernel: &[f64], output: &mut [f64]) {
    let n = input.len() as isize;
    let radius = (kernel.len() / 2) as isize;
    for (i, out) in output.iter_mut().enumerate() {
        let centre = i as isize;
        *out = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * input[reflect(centre + k as isize - radius, n)])
            .sum();
    }
}

fn smooth_axis(mut volume: ArrayViewMut3<'_, f32>, axis: usize, kernel: &[f64]) {
    if kernel.len() == 1 {
        return;
    }
    let len = volume.len_of(Axis(axis));
    let mut input = vec![0.0; len];
    let mut output = vec![0.0; len];
    for mut lane in volume.lanes_mut(Axis(axis)) {
        for (dst, src) in input.iter_mut().zip(lane.iter()) {
            *dst = *src as f64;
        }
        convolve_into(&input, kernel, &mut output);
        for (dst, src) in lane.iter_mut().zip(output.iter()) {
            *dst = *src as f32;
        }
    }
}

/// Smooth a single 3-D volume in place
pub fn smooth_volume3(mut volume: ArrayViewMut3<'_, f32>, kernels: &[Vec<f64>; 3]) {
    for (axis, kernel) in kernels.iter().enumerate() {
        smooth_axis(volume.view_mut(), axis, kernel);
    }
}

/// Smooth every volume of an `[x, y, z, t]` series in place
///
/// `fwhm` is in millimetres; zero disables smoothing.
pub fn smooth_volume(data: &mut Array4<f32>, fwhm: f64, voxel_sizes: [f64; 3]) -> SignalResult<()> {
    if !(fwhm.is_finite() && fwhm >= 0.0) {
        return Err(SignalError::InvalidParameter(format!(
            "smoothing FWHM must be non-negative, got {}",
            fwhm
        )));
    }
    if fwhm == 0.0 {
        return Ok(());
    }
    if let Some(bad) = voxel_sizes.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
        return Err(SignalError::InvalidParameter(format!(
            "voxel sizes must be positive, got {}",
            bad
        )));
    }

    let sigma_mm = fwhm_to_sigma(fwhm);
    let kernels = [
        gaussian_kernel(sigma_mm / voxel_sizes[0], KERNEL_TRUNCATE),
        gaussian_kernel(sigma_mm / voxel_sizes[1], KERNEL_TRUNCATE),
        gaussian_kernel(sigma_mm / voxel_sizes[2], KERNEL_TRUNCATE),
    ];
    debug!(
        target: "neurograph-signal",
        "Smoothing {} volumes at FWHM {} mm (kernel widths {}, {}, {})",
        data.len_of(Axis(3)),
        fwhm,
        kernels[0].len(),
        kernels[1].len(),
        kernels[2].len()
    );

    data.axis_iter_mut(Axis(3))
        .into_par_iter()
        .for_each(|volume| smooth_volume3(volume, &kernels));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fwhm_to_sigma() {
        // FWHM = 2 sqrt(2 ln 2) sigma
        assert_abs_diff_eq!(fwhm_to_sigma(2.354820045), 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_kernel_shape() {
        let k = gaussian_kernel(1.0, 4.0);
        assert_eq!(k.len(), 9);
        assert_abs_diff_eq!(k.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(k[0], k[8], epsilon = 1e-15);
        assert!(k[4] > k[3] && k[3] > k[2]);
        assert_eq!(gaussian_kernel(0.0, 4.0), vec![1.0]);
    }

    #[test]
    fn test_reflect_boundary() {
        let n = 4;
        let mapped: Vec<usize> = (-3..7).map(|i| reflect(i, n)).collect();
        assert_eq!(mapped, vec![2, 1, 0, 0, 1, 2, 3, 3, 2, 1]);
    }

    #[test]
    fn test_voxel_sizes_from_affine() {
        let affine = [
            [-3.0, 0.0, 0.0, 90.0],
            [0.0, 3.0, 0.0, -126.0],
            [0.0, 0.0, 4.0, -72.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert_eq!(voxel_sizes_from_affine(&affine), [3.0, 3.0, 4.0]);
    }

    #[test]
    fn test_smoothing_preserves_constant_and_mass() {
        let mut constant = Array4::<f32>::from_elem((6, 5, 4, 2), 7.0);
        smooth_volume(&mut constant, 6.0, [3.0, 3.0, 3.0]).unwrap();
        assert!(constant.iter().all(|v| (v - 7.0).abs() < 1e-4));

        let mut impulse = Array4::<f32>::zeros((15, 15, 15, 1));
        impulse[[7, 7, 7, 0]] = 1.0;
        smooth_volume(&mut impulse, 6.0, [3.0, 3.0, 3.0]).unwrap();
        let total: f32 = impulse.iter().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-4);
        assert!(impulse[[7, 7, 7, 0]] < 1.0);
        assert!(impulse[[8, 7, 7, 0]] > 0.0);
        assert_abs_diff_eq!(impulse[[6, 7, 7, 0]], impulse[[8, 7, 7, 0]], epsilon = 1e-7);
    }

    #[test]
    fn test_zero_fwhm_is_noop_and_bad_input_rejected() {
        let mut data = Array4::<f32>::from_shape_fn((3, 3, 3, 1), |(x, y, z, _)| (x + y + z) as f32);
        let before = data.clone();
        smooth_volume(&mut data, 0.0, [3.0, 3.0, 3.0]).unwrap();
        assert_eq!(data, before);

        assert!(smooth_volume(&mut data, -1.0, [3.0, 3.0, 3.0]).is_err());
        assert!(smooth_volume(&mut data, 6.0, [0.0, 3.0, 3.0]).is_err());
    }
}
