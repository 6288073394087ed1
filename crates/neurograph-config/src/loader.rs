// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, NeurographConfig, CONFIG_FILE_NAME};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Find the neurograph configuration file
///
/// Search order:
/// 1. `NEUROGRAPH_CONFIG_PATH` environment variable
/// 2. Current working directory: `./neurograph.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NEUROGRAPH_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NEUROGRAPH_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.extend(candidate_paths(&cwd));
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "configuration file '{}' not found in any of these locations:\n{}\n\nSet NEUROGRAPH_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Candidate locations starting at `start` and walking up 5 levels
fn candidate_paths(start: &Path) -> Vec<PathBuf> {
    let mut paths = vec![start.join(CONFIG_FILE_NAME)];
    let mut current = start.to_path_buf();
    for _ in 0..5 {
        match current.parent() {
            Some(parent) => {
                paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
            None => break,
        }
    }
    paths
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NeurographConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: NeurographConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `NEUROGRAPH_DATA_DIR` -> `paths.data_dir`
/// - `NEUROGRAPH_MAX_CORES` -> `system.max_cores`
/// - `NEUROGRAPH_LOG_LEVEL` -> `system.log_level`
/// - `NEUROGRAPH_TR` -> `preprocessing.t_r`
/// - `NEUROGRAPH_ATLAS` -> `extraction.atlas_path`
/// - `NEUROGRAPH_ATLAS_LABELS` -> `extraction.labels_path`
/// - `NEUROGRAPH_PERMUTATIONS` -> `statistics.permutations`
/// - `NEUROGRAPH_SEED` -> `statistics.seed`
pub fn apply_environment_overrides(config: &mut NeurographConfig) {
    let vars: HashMap<String, String> = [
        ("NEUROGRAPH_DATA_DIR", "data_dir"),
        ("NEUROGRAPH_MAX_CORES", "max_cores"),
        ("NEUROGRAPH_LOG_LEVEL", "log_level"),
        ("NEUROGRAPH_TR", "t_r"),
        ("NEUROGRAPH_ATLAS", "atlas"),
        ("NEUROGRAPH_ATLAS_LABELS", "atlas_labels"),
        ("NEUROGRAPH_PERMUTATIONS", "permutations"),
        ("NEUROGRAPH_SEED", "seed"),
    ]
    .iter()
    .filter_map(|(var, key)| env::var(var).ok().map(|value| (key.to_string(), value)))
    .collect();

    apply_cli_overrides(config, &vars);
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"t_r": "2.5", "max_cores": "8"}`)
///
/// Values that fail to parse are ignored.
pub fn apply_cli_overrides(config: &mut NeurographConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("data_dir") {
        config.paths.data_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("max_cores") {
        if let Ok(cores) = value.parse::<usize>() {
            config.system.max_cores = cores;
        }
    }
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("t_r") {
        if let Ok(t_r) = value.parse::<f64>() {
            config.preprocessing.t_r = t_r;
        }
    }
    if let Some(value) = cli_args.get("atlas") {
        config.extraction.atlas_path = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("atlas_labels") {
        config.extraction.labels_path = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("density") {
        if let Ok(density) = value.parse::<f64>() {
            config.graph.density = density;
        }
    }
    if let Some(value) = cli_args.get("permutations") {
        if let Ok(permutations) = value.parse::<usize>() {
            config.statistics.permutations = permutations;
        }
    }
    if let Some(value) = cli_args.get("seed") {
        if let Ok(seed) = value.parse::<u64>() {
            config.statistics.seed = seed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[system]
max_cores = 4

[preprocessing]
t_r = 2.5
smoothing_fwhm = 8.0

[graph]
threshold = "absolute"
min_weight = 0.25
"#
        )
        .unwrap();

        let config = load_config(Some(temp_file.path()), None).unwrap();
        assert_eq!(config.preprocessing.t_r, 2.5);
        assert_eq!(config.preprocessing.smoothing_fwhm, 8.0);
        assert_eq!(config.graph.threshold, crate::ThresholdKind::Absolute);
        assert_eq!(config.graph.min_weight, 0.25);
        // Untouched sections keep their defaults
        assert_eq!(config.cohort.subthreshold_min, 40.0);
        assert_eq!(config.preprocessing.low_pass, Some(0.1));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[system\nmax_cores = ").unwrap();

        let result = load_config(Some(temp_file.path()), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = NeurographConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("t_r".to_string(), "1.5".to_string());
        cli_args.insert("max_cores".to_string(), "8".to_string());
        cli_args.insert("density".to_string(), "0.2".to_string());
        cli_args.insert("seed".to_string(), "not-a-number".to_string());

        apply_cli_overrides(&mut config, &cli_args);

        assert_eq!(config.preprocessing.t_r, 1.5);
        assert_eq!(config.system.max_cores, 8);
        assert_eq!(config.graph.density, 0.2);
        assert_eq!(
            config.statistics.seed,
            crate::StatisticsConfig::default().seed
        );
    }

    #[test]
    fn test_candidate_paths_walk_up() {
        let paths = candidate_paths(Path::new("/a/b/c"));
        assert_eq!(paths[0], PathBuf::from("/a/b/c/neurograph.toml"));
        assert!(paths.contains(&PathBuf::from("/a/neurograph.toml")));
        assert!(paths.contains(&PathBuf::from("/neurograph.toml")));
    }
}
