// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization
//!
//! Console output always; with the `file-logging` feature, a timestamped run
//! folder with a combined JSON log plus one file per debug-enabled crate.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Logging settings, usually taken from the `[logging]` config section
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Level for crates without a debug flag
    pub default_level: String,
    pub file_logging: bool,
    pub log_dir: PathBuf,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
            retention_days: 30,
            retention_runs: 10,
        }
    }
}

/// Logging initialization result
///
/// Dropping the guard flushes and closes any file writers.
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    run_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder holding this session's log files, if file logging is active
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }
}

/// Filter for a per-crate log file: everything the crate logs at debug or above
pub fn crate_file_filter(crate_name: &str) -> Targets {
    Targets::new().with_target(crate_name, tracing::Level::DEBUG)
}

/// Initialize the global tracing subscriber
///
/// Creates a timestamped folder structure when file logging is enabled:
/// ```text
/// ./logs/
///   └── run_20250101_120000/
///       ├── neurograph-signal.log   (only for debug-enabled crates)
///       └── neurograph.log          (combined)
/// ```
pub fn init_logging(debug_flags: &CrateDebugFlags, options: &LoggingOptions) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(&options.default_level);

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_filter = EnvFilter::try_new(&filter)
        .with_context(|| format!("Invalid log filter: {}", filter))?;
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(console_filter)
            .boxed(),
    );

    #[cfg(feature = "file-logging")]
    let mut file_guards = Vec::new();
    let mut run_dir = None;

    if options.file_logging {
        #[cfg(feature = "file-logging")]
        {
            let run_folder = create_run_folder(&options.log_dir)?;
            cleanup_old_logs(&options.log_dir, options.retention_days, options.retention_runs)?;

            for crate_name in &debug_flags.enabled_crates {
                let appender =
                    tracing_appender::rolling::never(&run_folder, format!("{}.log", crate_name));
                let (writer, guard) = tracing_appender::non_blocking(appender);
                file_guards.push(guard);

                let targets = crate_file_filter(crate_name);
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true)
                        .json()
                        .with_filter(targets)
                        .boxed(),
                );
            }

            let combined = tracing_appender::rolling::never(&run_folder, "neurograph.log");
            let (writer, guard) = tracing_appender::non_blocking(combined);
            file_guards.push(guard);
            let combined_filter = EnvFilter::try_new(&filter)
                .with_context(|| format!("Invalid log filter: {}", filter))?;
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .with_filter(combined_filter)
                    .boxed(),
            );

            run_dir = Some(run_folder);
        }

        #[cfg(not(feature = "file-logging"))]
        eprintln!("Warning: file logging requested but the `file-logging` feature is disabled");
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        run_dir,
    })
}

/// Create `<base>/run_<timestamp>/`
pub fn create_run_folder(base_log_dir: &Path) -> Result<PathBuf> {
    let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
    let run_folder = base_log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
    Ok(run_folder)
}

/// Parse the timestamp out of a `run_YYYYMMDD_HHMMSS` folder name
fn parse_run_timestamp(dir_name: &str) -> Option<DateTime<Utc>> {
    let timestamp = dir_name.strip_prefix(RUN_PREFIX)?;
    let naive = NaiveDateTime::parse_from_str(timestamp, RUN_TIMESTAMP_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Clean up old run folders
///
/// Folders older than `retention_days` are removed first, then the oldest
/// remaining ones until at most `retention_runs` are left. Returns the number
/// of folders removed.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let cutoff_date = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(dt) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_run_timestamp)
        {
            runs.push((path, dt));
        }
    }

    // Oldest first
    runs.sort_by_key(|(_, dt)| *dt);

    let (expired, kept): (Vec<_>, Vec<_>) = runs.into_iter().partition(|(_, dt)| *dt < cutoff_date);
    let excess = kept.len().saturating_sub(retention_runs);

    let mut removed = 0;
    for (path, _) in expired.iter().chain(kept.iter().take(excess)) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }

    Ok(removed)
}
