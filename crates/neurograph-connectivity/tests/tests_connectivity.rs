//! Atlas-to-matrix tests
//!
//! Loads an atlas from disk, extracts region signals from a synthetic BOLD
//! image on a different grid, and checks the invariants every saved
//! connectivity matrix must satisfy.

use approx::assert_abs_diff_eq;
use ndarray::{Array2, Array4};
use neurograph_connectivity::{
    check_connectivity, correlation_matrix, extract_region_signals, fisher_z,
    resample_labels_nearest, Affine, Atlas, DEFAULT_CLIP,
};
use neurograph_io::{write_labels, write_nifti, NiftiHeader, NiftiImage, RegionLabel};
use proptest::prelude::*;

/// 8×4×4 atlas on a 2 mm grid split into four slabs along x
fn write_atlas(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let data = Array4::from_shape_fn((8, 4, 4, 1), |(x, _, _, _)| (x / 2 + 1) as f32);
    let img = NiftiImage::from_array(data, &NiftiHeader::new([8, 4, 4, 1], [2.0, 2.0, 2.0], 0.0));
    let img_path = dir.join("atlas.nii.gz");
    let labels_path = dir.join("atlas_labels.txt");
    write_nifti(&img_path, &img).unwrap();
    write_labels(
        &labels_path,
        &[
            RegionLabel::new(1, "Frontal Pole"),
            RegionLabel::new(2, "Insular Cortex"),
            RegionLabel::new(3, "Superior Frontal Gyrus"),
            RegionLabel::new(4, "Middle Frontal Gyrus"),
        ],
    )
    .unwrap();
    (img_path, labels_path)
}

#[test]
fn test_bold_on_coarser_grid_to_connectivity() {
    let dir = tempfile::tempdir().unwrap();
    let (img_path, labels_path) = write_atlas(dir.path());
    let atlas = Atlas::load(&img_path, &labels_path).unwrap();
    assert_eq!(atlas.labels.len(), 4);

    // 4 mm functional grid: one functional voxel per atlas slab
    let target = Affine([
        [4.0, 0.0, 0.0, 0.0],
        [0.0, 4.0, 0.0, 0.0],
        [0.0, 0.0, 4.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);
    let labels = resample_labels_nearest(&atlas, [4, 2, 2], &target).unwrap();

    // Regions 1 and 2 share a signal, region 3 is its negative, region 4 differs
    let bold = Array4::from_shape_fn((4, 2, 2, 30), |(x, y, _, t)| {
        let base = (t as f32 * 0.7).sin();
        match x {
            0 | 1 => base + 0.001 * y as f32,
            2 => -base,
            _ => (t as f32 * 1.9).cos(),
        }
    });
    let ts = extract_region_signals(&bold, &labels, &atlas.labels, true).unwrap();
    assert_eq!(ts.n_regions(), 4);
    assert!(ts.quality().passed() && ts.quality().expected_regions);

    let r = correlation_matrix(&ts.data).unwrap();
    assert_abs_diff_eq!(r[[0, 1]], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(r[[0, 2]], -1.0, epsilon = 1e-6);

    let z = fisher_z(&r, DEFAULT_CLIP).unwrap();
    assert!(check_connectivity(&z).passed());
    assert!(z.iter().all(|v| v.abs() <= DEFAULT_CLIP.atanh() + 1e-12));
}

fn timeseries() -> impl Strategy<Value = Array2<f64>> {
    (3usize..40, 2usize..8).prop_flat_map(|(t, r)| {
        prop::collection::vec(-100.0f64..100.0, t * r)
            .prop_map(move |v| Array2::from_shape_vec((t, r), v).unwrap())
    })
}

fn has_constant_column(ts: &Array2<f64>) -> bool {
    ts.columns().into_iter().any(|c| {
        let first = c[0];
        c.iter().all(|&v| (v - first).abs() < 1e-9)
    })
}

proptest! {
    #[test]
    fn prop_correlation_is_bounded_and_symmetric(ts in timeseries()) {
        prop_assume!(!has_constant_column(&ts));
        let r = correlation_matrix(&ts).unwrap();
        let n = r.nrows();
        for i in 0..n {
            prop_assert!((r[[i, i]] - 1.0).abs() < 1e-9);
            for j in 0..n {
                prop_assert!(r[[i, j]] >= -1.0 && r[[i, j]] <= 1.0);
                prop_assert!((r[[i, j]] - r[[j, i]]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn prop_fisher_z_passes_quality(ts in timeseries()) {
        prop_assume!(!has_constant_column(&ts));
        let z = fisher_z(&correlation_matrix(&ts).unwrap(), DEFAULT_CLIP).unwrap();
        prop_assert!(check_connectivity(&z).passed());
    }
}
