//! Configuration validation
//!
//! This module provides validation logic to ensure configuration values are
//! consistent and within valid ranges before any subject is processed.

use crate::{ConfigError, ConfigResult, NeurographConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Filter band consistency (positive TR, cutoffs ordered and below Nyquist)
/// - Graph and statistics parameters within their ranges
/// - Cohort thresholds ordered
/// - Required fields
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation found
pub fn validate_config(config: &NeurographConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_preprocessing(config, &mut errors);
    validate_connectivity(config, &mut errors);
    validate_graph(config, &mut errors);
    validate_cohort(config, &mut errors);
    validate_required_fields(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn invalid(errors: &mut Vec<ConfigValidationError>, field: &str, reason: &str) {
    errors.push(ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    });
}

fn validate_preprocessing(config: &NeurographConfig, errors: &mut Vec<ConfigValidationError>) {
    let pre = &config.preprocessing;

    if !(pre.t_r > 0.0) {
        invalid(errors, "preprocessing.t_r", "must be positive");
        // Nyquist checks are meaningless without a valid TR
        return;
    }
    let nyquist = 0.5 / pre.t_r;

    if let Some(high_pass) = pre.high_pass {
        if high_pass < 0.0 {
            invalid(errors, "preprocessing.high_pass", "must be non-negative");
        }
    }
    if let Some(low_pass) = pre.low_pass {
        if low_pass <= 0.0 {
            invalid(errors, "preprocessing.low_pass", "must be positive");
        } else if low_pass >= nyquist {
            invalid(
                errors,
                "preprocessing.low_pass",
                &format!("must be below the Nyquist frequency ({:.4} Hz)", nyquist),
            );
        }
    }
    if let (Some(high_pass), Some(low_pass)) = (pre.high_pass, pre.low_pass) {
        if high_pass >= low_pass {
            invalid(
                errors,
                "preprocessing.high_pass",
                "must be lower than preprocessing.low_pass",
            );
        }
    }
    if pre.filter_order == 0 {
        invalid(errors, "preprocessing.filter_order", "must be at least 1");
    }
    if !(pre.smoothing_fwhm >= 0.0) {
        invalid(errors, "preprocessing.smoothing_fwhm", "must be non-negative");
    }
}

fn validate_connectivity(config: &NeurographConfig, errors: &mut Vec<ConfigValidationError>) {
    let clip = config.connectivity.correlation_clip;
    if !(clip > 0.0 && clip < 1.0) {
        invalid(
            errors,
            "connectivity.correlation_clip",
            "must be between 0.0 and 1.0 (exclusive)",
        );
    }
    if config.connectivity.figure_cell_size == 0 {
        invalid(errors, "connectivity.figure_cell_size", "must be at least 1");
    }
}

fn validate_graph(config: &NeurographConfig, errors: &mut Vec<ConfigValidationError>) {
    let density = config.graph.density;
    if !(density > 0.0 && density <= 1.0) {
        invalid(errors, "graph.density", "must be in (0.0, 1.0]");
    }
    if !(config.graph.min_weight >= 0.0) {
        invalid(errors, "graph.min_weight", "must be non-negative");
    }
    if !(config.graph.resolution > 0.0) {
        invalid(errors, "graph.resolution", "must be positive");
    }

    if config.statistics.permutations == 0 {
        invalid(errors, "statistics.permutations", "must be at least 1");
    }
    let alpha = config.statistics.alpha;
    if !(alpha > 0.0 && alpha < 1.0) {
        invalid(errors, "statistics.alpha", "must be between 0.0 and 1.0");
    }
    if config.batch.progress_interval == 0 {
        invalid(errors, "batch.progress_interval", "must be at least 1");
    }
}

fn validate_cohort(config: &NeurographConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.cohort.subthreshold_min >= config.cohort.diagnosed_min {
        invalid(
            errors,
            "cohort.subthreshold_min",
            "must be lower than cohort.diagnosed_min",
        );
    }
}

fn validate_required_fields(config: &NeurographConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.extraction.atlas_path.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "extraction.atlas_path".to_string(),
        });
    }
    if config.cohort.index_column.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "cohort.index_column".to_string(),
        });
    }
    if !LOG_LEVELS.contains(&config.system.log_level.to_lowercase().as_str()) {
        invalid(
            errors,
            "system.log_level",
            "must be one of trace, debug, info, warn, error",
        );
    }
}
