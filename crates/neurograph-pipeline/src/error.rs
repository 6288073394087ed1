/*!
Pipeline error types.

Errors from every lower layer convert into [`PipelineError`] so a stage can
use `?` throughout; the batch runner records the rendered message as the
reason a subject failed.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use neurograph_config::ConfigError;
use neurograph_connectivity::ConnectivityError;
use neurograph_graph::GraphError;
use neurograph_io::DataIoError;
use neurograph_signal::SignalError;
use std::path::PathBuf;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] DataIoError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// An input the stage depends on has not been produced
    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Phenotypic table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Figure: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Data failed a quality check
    #[error("Quality check failed for {subject}: {detail}")]
    QualityCheck { subject: String, detail: String },

    /// An array does not have the shape an operation needs
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Invalid cohort: {0}")]
    InvalidCohort(String),

    #[error("Thread pool: {0}")]
    ThreadPool(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(DataIoError::Io(err))
    }
}
