/*!
Error types for graph construction and statistics.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Adjacency matrix must be square, got {rows}×{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Group '{group}' has {count} samples, at least {minimum} required")]
    TooFewSamples {
        group: String,
        count: usize,
        minimum: usize,
    },
}
