/*!
Error types for file format I/O.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use std::path::PathBuf;
use thiserror::Error;

/// Result type for file format operations
pub type DataIoResult<T> = Result<T, DataIoError>;

/// Error types for file format operations
#[derive(Error, Debug)]
pub enum DataIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid NIfTI header: {0}")]
    InvalidHeader(String),

    #[error("Unsupported NIfTI datatype code {0}")]
    UnsupportedDataType(i16),

    #[error("Truncated data: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Invalid NPY file: {0}")]
    InvalidNpy(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid run log: {0}")]
    InvalidRunLog(String),

    #[error("Invalid label list at line {line}: {reason}")]
    InvalidLabel { line: usize, reason: String },
}

impl From<ndarray::ShapeError> for DataIoError {
    fn from(err: ndarray::ShapeError) -> Self {
        DataIoError::ShapeMismatch(err.to_string())
    }
}

/// Map a `NotFound` I/O error to [`DataIoError::NotFound`] with the path attached
pub(crate) fn open_error(path: &std::path::Path, err: std::io::Error) -> DataIoError {
    if err.kind() == std::io::ErrorKind::NotFound {
        DataIoError::NotFound(path.to_path_buf())
    } else {
        DataIoError::Io(err)
    }
}
