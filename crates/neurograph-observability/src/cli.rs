//! Per-crate debug flags
//!
//! Supports `--debug neurograph-signal`, `--debug all` and the
//! `NEUROGRAPH_DEBUG` environment variable to raise individual crates to
//! debug level.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Set of crates whose logs are raised to debug level
///
/// # Example
/// ```rust
/// use neurograph_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_names(vec!["neurograph-signal".to_string()]);
/// assert!(flags.is_enabled("neurograph-signal"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Build flags from crate names (as given to `--debug`)
    ///
    /// `all` enables every known crate. A bare suffix such as `signal` is
    /// expanded to `neurograph-signal`.
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();
        for name in names {
            flags.enable(&name);
        }
        flags
    }

    fn enable(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if name == "all" {
            for crate_name in KNOWN_CRATES {
                self.enabled_crates.insert(crate_name.to_string());
            }
        } else if name.starts_with("neurograph") {
            self.enabled_crates.insert(name.to_string());
        } else {
            self.enabled_crates.insert(format!("neurograph-{}", name));
        }
    }

    /// Merge names from a comma-separated list (`NEUROGRAPH_DEBUG` format)
    pub fn merge_list(&mut self, list: &str) {
        for name in list.split(',') {
            self.enable(name);
        }
    }

    /// Check if debug is enabled for a specific crate
    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    /// Check if debug is enabled for any crate
    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Get log level for a crate
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Create an `EnvFilter` directive string from the flags
    ///
    /// Format: `neurograph-signal=debug,neurograph-graph=debug,info`
    ///
    /// Directives use the hyphenated crate name, which is the explicit
    /// `target:` of every log call in the workspace.
    pub fn to_filter_string(&self, default_level: &str) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates
            .iter()
            .map(|name| format!("{}=debug", name))
            .collect();
        filters.push(default_level.to_lowercase());
        filters.join(",")
    }
}

/// Combine `--debug` values with the `NEUROGRAPH_DEBUG` environment variable
///
/// Environment variable format: comma-separated crate names or `all`.
pub fn parse_debug_flags<I>(cli_names: I) -> CrateDebugFlags
where
    I: IntoIterator<Item = String>,
{
    let mut flags = CrateDebugFlags::from_names(cli_names);
    if let Ok(env_var) = env::var("NEUROGRAPH_DEBUG") {
        flags.merge_list(&env_var);
    }
    flags
}

/// Help text listing the crates that accept debug flags
pub fn debug_flags_help() -> String {
    format!(
        "Crates accepted by --debug (or NEUROGRAPH_DEBUG, comma-separated): all, {}",
        KNOWN_CRATES.join(", ")
    )
}
