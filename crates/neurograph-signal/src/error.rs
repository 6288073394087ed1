/*!
Error types for signal processing.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use thiserror::Error;

/// Result type for signal processing operations
pub type SignalResult<T> = Result<T, SignalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Signal too short: {length} timepoints, at least {minimum} required")]
    TooShort { length: usize, minimum: usize },
}
