// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Label atlases and nearest-neighbour resampling onto a functional grid

use crate::affine::Affine;
use crate::error::{ConnectivityError, ConnectivityResult};
use ndarray::{Array3, Axis, Zip};
use neurograph_io::{read_labels, read_nifti, NiftiImage, RegionLabel};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Affines closer than this (per entry) are treated as the same grid
const SAME_GRID_TOLERANCE: f64 = 1e-6;

/// A 3-D integer label volume (0 = background) and the names of its regions
#[derive(Debug, Clone)]
pub struct Atlas {
    pub labels_img: NiftiImage,
    /// Regions in label-file order, background excluded
    pub labels: Vec<RegionLabel>,
}

impl Atlas {
    pub fn load(img_path: &Path, labels_path: &Path) -> ConnectivityResult<Self> {
        let labels_img = read_nifti(img_path)?;
        let labels = read_labels(labels_path)?;
        let atlas = Self::new(labels_img, labels)?;
        info!(
            target: "neurograph-connectivity",
            "Loaded atlas {} ({} regions, grid {:?})",
            img_path.display(),
            atlas.labels.len(),
            atlas.shape()
        );
        Ok(atlas)
    }

    pub fn new(labels_img: NiftiImage, labels: Vec<RegionLabel>) -> ConnectivityResult<Self> {
        if labels_img.n_timepoints() != 1 {
            return Err(ConnectivityError::InvalidAtlas(format!(
                "label image must be 3-D, found {} volumes",
                labels_img.n_timepoints()
            )));
        }
        if labels.is_empty() {
            return Err(ConnectivityError::InvalidAtlas(
                "label list names no regions".to_string(),
            ));
        }
        Ok(Self { labels_img, labels })
    }

    pub fn shape(&self) -> [usize; 3] {
        let [x, y, z, _] = self.labels_img.shape();
        [x, y, z]
    }

    pub fn affine(&self) -> Affine {
        Affine(self.labels_img.header.affine())
    }

    /// Integer labels; negative or non-finite values count as background
    pub fn label_volume(&self) -> Array3<u32> {
        self.labels_img
            .data
            .index_axis(Axis(3), 0)
            .mapv(|v| if v.is_finite() && v > 0.0 { v.round() as u32 } else { 0 })
    }

    /// Distinct non-zero labels present in the volume
    pub fn labels_present(&self) -> BTreeSet<u32> {
        self.label_volume().iter().copied().filter(|&l| l != 0).collect()
    }
}

/// Sample the atlas on a target grid by nearest neighbour
///
/// Each target voxel is mapped through `inv(atlas_affine) · target_affine`;
/// voxels landing outside the atlas get label 0.
pub fn resample_labels_nearest(
    atlas: &Atlas,
    target_shape: [usize; 3],
    target_affine: &Affine,
) -> ConnectivityResult<Array3<u32>> {
    let source = atlas.label_volume();
    let atlas_affine = atlas.affine();
    if atlas.shape() == target_shape && atlas_affine.approx_eq(target_affine, SAME_GRID_TOLERANCE) {
        debug!(target: "neurograph-connectivity", "Atlas already on the target grid");
        return Ok(source);
    }

    let voxel_map = atlas_affine.inverse()?.compose(target_affine);
    let [sx, sy, sz] = atlas.shape();
    let mut out = Array3::<u32>::zeros((target_shape[0], target_shape[1], target_shape[2]));

    Zip::indexed(&mut out).par_for_each(|(i, j, k), label| {
        let p = voxel_map.apply([i as f64, j as f64, k as f64]);
        let idx = [p[0].round(), p[1].round(), p[2].round()];
        let inside = idx[0] >= 0.0
            && idx[1] >= 0.0
            && idx[2] >= 0.0
            && (idx[0] as usize) < sx
            && (idx[1] as usize) < sy
            && (idx[2] as usize) < sz;
        if inside {
            *label = source[[idx[0] as usize, idx[1] as usize, idx[2] as usize]];
        }
    });

    debug!(
        target: "neurograph-connectivity",
        "Resampled atlas {:?} onto grid {:?}",
        atlas.shape(),
        target_shape
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use neurograph_io::NiftiHeader;

    fn two_region_atlas() -> Atlas {
        // Left half label 1, right half label 2, on a 2 mm grid
        let data = Array4::from_shape_fn((4, 2, 2, 1), |(x, _, _, _)| if x < 2 { 1.0 } else { 2.0 });
        let img = NiftiImage::from_array(data, &NiftiHeader::new([4, 2, 2, 1], [2.0, 2.0, 2.0], 0.0));
        Atlas::new(
            img,
            vec![RegionLabel::new(1, "Left"), RegionLabel::new(2, "Right")],
        )
        .unwrap()
    }

    #[test]
    fn test_same_grid_short_circuits() {
        let atlas = two_region_atlas();
        let out = resample_labels_nearest(&atlas, [4, 2, 2], &atlas.affine()).unwrap();
        assert_eq!(out, atlas.label_volume());
        assert_eq!(atlas.labels_present().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_coarser_target_grid() {
        let atlas = two_region_atlas();
        // 4 mm voxels: target voxel i sits on atlas voxel 2i
        let target = Affine([
            [4.0, 0.0, 0.0, 0.0],
            [0.0, 4.0, 0.0, 0.0],
            [0.0, 0.0, 4.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let out = resample_labels_nearest(&atlas, [3, 1, 1], &target).unwrap();
        assert_eq!(out[[0, 0, 0]], 1);
        assert_eq!(out[[1, 0, 0]], 2);
        // x = 8 mm is atlas voxel 4, past the edge
        assert_eq!(out[[2, 0, 0]], 0);
    }

    #[test]
    fn test_rejects_4d_atlas() {
        let data = Array4::<f32>::zeros((2, 2, 2, 3));
        let img = NiftiImage::from_array(data, &NiftiHeader::new([2, 2, 2, 3], [2.0, 2.0, 2.0], 2.0));
        assert!(matches!(
            Atlas::new(img, vec![RegionLabel::new(1, "A")]),
            Err(ConnectivityError::InvalidAtlas(_))
        ));
    }
}
