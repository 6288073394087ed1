// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# neurograph-io

On-disk formats used between pipeline stages:

- `nifti` - NIfTI-1 single-file volumes (`.nii`, `.nii.gz`)
- `npy` - NumPy `.npy` 2-D float matrices (time series, connectivity)
- `run_log` - plain-text batch logs whose `SUCCESSFUL SUBJECTS:` section feeds the next stage
- `labels` - `index: name` atlas label lists

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod labels;
pub mod nifti;
pub mod npy;
pub mod run_log;

pub use error::{DataIoError, DataIoResult};
pub use labels::{read_labels, write_labels, RegionLabel};
pub use nifti::{read_nifti, write_nifti, NiftiDataType, NiftiHeader, NiftiImage};
pub use npy::{read_npy, write_npy};
pub use run_log::{read_successful_subjects, write_failed_subjects, RunLog};
