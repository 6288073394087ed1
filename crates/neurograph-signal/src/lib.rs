// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# neurograph-signal

Preprocessing of resting-state BOLD data:

- `temporal` - linear detrending, z-scoring and non-finite replacement of 1-D signals
- `butterworth` - zero-phase Butterworth band-pass (cascaded second-order sections)
- `clean` - the full temporal cleaning chain for signal matrices and 4-D volumes
- `smoothing` - separable Gaussian spatial smoothing by FWHM in millimetres
- `stats` - value summaries used by quality checks

Signal matrices are `time × series`; volumes are `[x, y, z, t]`.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod butterworth;
pub mod clean;
pub mod error;
pub mod smoothing;
pub mod stats;
pub mod temporal;

pub use butterworth::ButterworthBandpass;
pub use clean::{clean_signals, clean_volume, CleanOptions};
pub use error::{SignalError, SignalResult};
pub use smoothing::{fwhm_to_sigma, gaussian_kernel, smooth_volume, voxel_sizes_from_affine};
pub use stats::{volume_stats, VolumeStats};
pub use temporal::{detrend, ensure_finite, standardize_zscore};
