// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurograph-observability
//!
//! Logging infrastructure shared by the neurograph binaries.
//!
//! Provides consistent logging across all workspace crates with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: timestamped run folders with rolling JSON log files

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known workspace crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "neurograph-config",
    "neurograph-io",
    "neurograph-signal",
    "neurograph-connectivity",
    "neurograph-graph",
    "neurograph-pipeline",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_crates_are_log_targets() {
        // Library crates log with `target: "<crate-name>"`, so the names here
        // double as filter directives
        for name in KNOWN_CRATES {
            assert!(name.starts_with("neurograph-"));
        }
    }
}
