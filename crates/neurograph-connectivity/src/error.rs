/*!
Error types for connectivity computation.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use neurograph_io::DataIoError;
use neurograph_signal::SignalError;
use thiserror::Error;

pub type ConnectivityResult<T> = Result<T, ConnectivityError>;

#[derive(Error, Debug)]
pub enum ConnectivityError {
    #[error(transparent)]
    Io(#[from] DataIoError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("Invalid atlas: {0}")]
    InvalidAtlas(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Affine is not invertible (determinant {0})")]
    SingularAffine(f64),

    #[error("No atlas region overlaps the image")]
    NoRegions,

    #[error("Need at least {minimum} timepoints, got {actual}")]
    TooFewTimepoints { actual: usize, minimum: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
