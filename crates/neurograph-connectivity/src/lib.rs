// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# neurograph-connectivity

From preprocessed BOLD volumes to region-by-region connectivity:

1. [`Atlas`] - a 3-D label volume plus its region names
2. [`resample_labels_nearest`] - put the atlas on the functional grid
3. [`extract_region_signals`] - mean time course per region
4. [`correlation_matrix`] and [`fisher_z`] - Pearson r, then `atanh`
5. [`check_connectivity`] / [`check_timeseries`] - pass/fail quality flags

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod affine;
pub mod atlas;
pub mod correlation;
pub mod error;
pub mod extract;
pub mod quality;

pub use affine::Affine;
pub use atlas::{resample_labels_nearest, Atlas};
pub use correlation::{correlation_matrix, fisher_z, DEFAULT_CLIP};
pub use error::{ConnectivityError, ConnectivityResult};
pub use extract::{extract_region_signals, RegionTimeSeries};
pub use quality::{check_connectivity, check_timeseries, ConnectivityQuality, TimeSeriesQuality};
