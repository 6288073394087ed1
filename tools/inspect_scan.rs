// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Scan inspection tool

Prints the header and value summary of a NIfTI file. Given a directory of
`sub-*` folders it lists the subjects and inspects the first BOLD run found.

Usage:
  inspect_scan data/raw/NYU
  inspect_scan data/processed/NYU/sub-0010001/sub-0010001_preprocessed.nii.gz

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use neurograph::io::read_nifti;
use neurograph::signal::volume_stats;

/// Inspect a NIfTI scan or a directory of subjects
#[derive(Parser, Debug)]
#[command(name = "inspect_scan", version, long_about = None)]
struct Args {
    /// NIfTI file (.nii or .nii.gz) or directory containing sub-* folders
    path: PathBuf,

    /// Session folder searched inside each subject
    #[arg(long, default_value = "ses-1")]
    session: String,

    /// Subjects listed when inspecting a directory
    #[arg(long, default_value_t = 5)]
    show: usize,
}

fn is_nifti(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

fn list_subjects(dir: &Path) -> Result<Vec<String>> {
    let mut subjects: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("sub-"))
        .collect();
    subjects.sort();
    Ok(subjects)
}

fn first_nifti(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_nifti(p))
        .collect();
    files.sort();
    files.into_iter().next()
}

fn inspect_file(path: &Path) -> Result<()> {
    let img = read_nifti(path).with_context(|| format!("loading {}", path.display()))?;
    let [x, y, z, t] = img.shape();
    let [dx, dy, dz] = img.header.voxel_sizes();
    let size_mb = fs::metadata(path)?.len() as f64 / (1024.0 * 1024.0);

    println!("Loaded: {}", path.display());
    println!("   Dimensions:  {} x {} x {} voxels", x, y, z);
    println!("   Time points: {} volumes", t);
    println!("   Voxel size:  {:.2} x {:.2} x {:.2} mm", dx, dy, dz);
    match img.header.repetition_time() {
        Some(tr) => println!("   TR:          {:.3} s", tr),
        None => println!("   TR:          n/a"),
    }
    println!("   Data type:   {:?}", img.header.datatype);
    println!("   File size:   {:.1} MB", size_mb);

    let stats = volume_stats(&img.data);
    println!("   Values:      {}", stats);
    if !stats.is_finite() {
        println!("   Warning: found NaN or Inf values");
    }
    Ok(())
}

fn inspect_dir(dir: &Path, session: &str, show: usize) -> Result<()> {
    let subjects = list_subjects(dir)?;
    println!("Found {} subjects in {}", subjects.len(), dir.display());
    if subjects.is_empty() {
        return Ok(());
    }
    let shown: Vec<&str> = subjects.iter().take(show).map(|s| s.as_str()).collect();
    println!("First {}: {}", shown.len(), shown.join(", "));

    let func = dir.join(&subjects[0]).join(session).join("func");
    if !func.exists() {
        println!("Path doesn't exist: {}", func.display());
        return Ok(());
    }
    match first_nifti(&func) {
        Some(file) => {
            println!();
            inspect_file(&file)
        }
        None => {
            println!("No NIfTI files in {}", func.display());
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.path.is_dir() {
        inspect_dir(&args.path, &args.session, args.show)
    } else if is_nifti(&args.path) {
        inspect_file(&args.path)
    } else if args.path.exists() {
        bail!("{} is not a NIfTI file", args.path.display())
    } else {
        bail!("{} does not exist", args.path.display())
    }
}
