// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
neurograph command line

Runs the connectivity study one stage at a time or end to end.

Usage:
  neurograph [--config neurograph.toml] [--data-dir data] <command>

Examples:
  neurograph cohort
  neurograph preprocess sub-0010001
  neurograph connectivity --figure
  neurograph --max-cores 8 --debug neurograph-signal run

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

use neurograph::config::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    validate_config, ConfigError, NeurographConfig,
};
use neurograph::observability::{debug_flags_help, init_logging, parse_debug_flags, LoggingOptions};
use neurograph::pipeline::{
    connectivity_subject, extract_subject, group_comparison, metrics_subject, preprocess_subject,
    run_pipeline, run_stage, BatchOutcome, BatchRunner, Cohort, PipelineContext, Stage, StageReport,
};

/// Resting-state fMRI connectivity and graph-theory pipeline
#[derive(Parser, Debug)]
#[command(name = "neurograph", version, author, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Configuration file (default: search for neurograph.toml, else built-in defaults)
    #[arg(short, long, env = "NEUROGRAPH_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Root directory for relative data paths
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Worker threads for batch stages (0 = all cores)
    #[arg(long)]
    max_cores: Option<usize>,

    /// Default log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable debug logging for a crate (repeatable)
    #[arg(long = "debug", value_name = "CRATE")]
    debug: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify the phenotypic table and write the sample summary
    Cohort,
    /// Clean and smooth raw BOLD runs
    Preprocess {
        /// Single subject, e.g. sub-0010001 (default: every analysis subject)
        subject: Option<String>,
    },
    /// Extract atlas region time series
    Extract { subject: Option<String> },
    /// Compute Fisher-z connectivity matrices
    Connectivity {
        subject: Option<String>,
        /// Also save a heatmap PNG per subject
        #[arg(long)]
        figure: bool,
    },
    /// Threshold matrices and compute graph metrics
    Metrics { subject: Option<String> },
    /// Permutation comparison of Subthreshold vs Diagnosed metrics
    Compare,
    /// Every stage in order, then the group comparison
    Run {
        #[arg(long)]
        figures: bool,
    },
    /// Load and validate the configuration, then print the resolved paths
    ValidateConfig,
}

fn resolve_config(args: &Args) -> Result<NeurographConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(Some(path.as_path()), None)
            .with_context(|| format!("loading {}", path.display()))?,
        None => match find_config_file() {
            Ok(path) => load_config(Some(path.as_path()), None)
                .with_context(|| format!("loading {}", path.display()))?,
            Err(ConfigError::FileNotFound(_)) => {
                let mut config = NeurographConfig::default();
                apply_environment_overrides(&mut config);
                config
            }
            Err(e) => return Err(e.into()),
        },
    };

    let mut overrides = HashMap::new();
    if let Some(dir) = &args.data_dir {
        overrides.insert("data_dir".to_string(), dir.display().to_string());
    }
    if let Some(cores) = args.max_cores {
        overrides.insert("max_cores".to_string(), cores.to_string());
    }
    if let Some(level) = &args.log_level {
        overrides.insert("log_level".to_string(), level.clone());
    }
    apply_cli_overrides(&mut config, &overrides);
    validate_config(&config)?;
    Ok(config)
}

fn print_report(report: &StageReport) {
    println!(
        "{} {}: {} ({:.1} MB)",
        report.stage.name(),
        report.subject,
        report.output.display(),
        report.bytes as f64 / 1e6
    );
}

fn print_outcome(outcome: &BatchOutcome) {
    let verified = outcome.verify_outputs();
    println!(
        "{}: {}/{} successful in {:.1} minutes, {} files ({:.1} MB)",
        outcome.stage.name(),
        outcome.successful.len(),
        outcome.total(),
        outcome.elapsed.as_secs_f64() / 60.0,
        verified.files,
        verified.megabytes()
    );
    for (subject, reason) in &outcome.errors {
        println!("  failed {}: {}", subject, reason);
    }
}

fn run_command(ctx: &PipelineContext, command: &Command) -> Result<()> {
    let single_or_batch = |stage: Stage, subject: &Option<String>, figure: bool| -> Result<()> {
        match subject {
            Some(s) => {
                let report = match stage {
                    Stage::Preprocess => preprocess_subject(ctx, s)?,
                    Stage::Extract => extract_subject(ctx, s)?,
                    Stage::Connectivity => connectivity_subject(ctx, s, figure)?,
                    Stage::Metrics => metrics_subject(ctx, s)?,
                };
                print_report(&report);
            }
            None => {
                let runner = BatchRunner::from_config(&ctx.config)?;
                print_outcome(&run_stage(ctx, &runner, stage, figure)?);
            }
        }
        Ok(())
    };

    match command {
        Command::Cohort => {
            let cohort = Cohort::load(ctx.layout.phenotypic_file(), &ctx.config.cohort)?;
            let summary = cohort.write_summary(&ctx.layout.sample_summary())?;
            print!("{}", summary.render(&Local::now().format("%Y-%m-%d").to_string()));
        }
        Command::Preprocess { subject } => single_or_batch(Stage::Preprocess, subject, false)?,
        Command::Extract { subject } => single_or_batch(Stage::Extract, subject, false)?,
        Command::Connectivity { subject, figure } => {
            single_or_batch(Stage::Connectivity, subject, *figure)?
        }
        Command::Metrics { subject } => single_or_batch(Stage::Metrics, subject, false)?,
        Command::Compare => {
            let cohort = Cohort::load(ctx.layout.phenotypic_file(), &ctx.config.cohort)?;
            let comparison = group_comparison(&cohort, &ctx.layout, &ctx.config.statistics)?;
            comparison.write(
                &ctx.layout.group_comparison_json(),
                &ctx.layout.group_comparison_table(),
            )?;
            print!("{}", comparison.render_table());
        }
        Command::Run { figures } => {
            let runner = BatchRunner::from_config(&ctx.config)?;
            let run = run_pipeline(ctx, &runner, *figures)?;
            for outcome in &run.outcomes {
                print_outcome(outcome);
            }
            match &run.comparison {
                Some(comparison) => print!("\n{}", comparison.render_table()),
                None => warn!("No group comparison was produced"),
            }
        }
        Command::ValidateConfig => {
            println!("Configuration OK");
            let layout = &ctx.layout;
            println!("  phenotypic:   {}", layout.phenotypic_file().display());
            println!("  raw:          {}", layout.raw_dir().display());
            println!("  processed:    {}", layout.processed_dir().display());
            println!("  timeseries:   {}", layout.timeseries_dir().display());
            println!("  connectivity: {}", layout.connectivity_dir().display());
            println!("  metrics:      {}", layout.metrics_dir().display());
            println!("  results:      {}", layout.results_dir().display());
            println!("  atlas:        {}", layout.atlas_path().display());
            for stage in Stage::ALL {
                println!("  {:<13} {}", format!("{} log:", stage.name()), layout.run_log(stage).display());
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    let debug_flags = parse_debug_flags(args.debug.clone());
    let logging = LoggingOptions {
        default_level: config.system.log_level.clone(),
        file_logging: config.logging.file_logging,
        log_dir: config.logging.dir.clone(),
        retention_days: config.logging.retention_days,
        retention_runs: config.logging.retention_runs,
    };
    let _guard = init_logging(&debug_flags, &logging)?;
    info!(
        "neurograph {} (data dir {})",
        neurograph::VERSION,
        config.paths.data_dir.display()
    );

    let ctx = PipelineContext::new(config);
    run_command(&ctx, &args.command)
}
