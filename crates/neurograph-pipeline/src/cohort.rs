// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Phenotypic cohort: ADHD Index grouping and subject ids

use crate::error::{PipelineError, PipelineResult};
use chrono::Local;
use neurograph_config::CohortConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

const DX_COLUMN: &str = "DX";
const AGE_COLUMN: &str = "Age";
const GENDER_COLUMN: &str = "Gender";

/// Symptom group assigned from the ADHD Index T-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Group {
    Neurotypical,
    Subthreshold,
    Diagnosed,
    Unknown,
}

impl Group {
    pub const ALL: [Group; 4] = [
        Group::Neurotypical,
        Group::Subthreshold,
        Group::Diagnosed,
        Group::Unknown,
    ];

    /// Groups that enter the imaging pipeline
    pub fn is_analysed(self) -> bool {
        matches!(self, Group::Subthreshold | Group::Diagnosed)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Group::Neurotypical => "Neurotypical",
            Group::Subthreshold => "Subthreshold",
            Group::Diagnosed => "Diagnosed",
            Group::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// One row of the phenotypic table
#[derive(Debug, Clone, PartialEq)]
pub struct PhenotypicRecord {
    pub scan_dir_id: u64,
    pub adhd_index: Option<f64>,
    pub dx: Option<f64>,
    pub age: Option<f64>,
    pub gender: Option<f64>,
}

/// Assign a group; an empty index cell counts as the missing code
pub fn classify(record: &PhenotypicRecord, cfg: &CohortConfig) -> Group {
    match record.adhd_index {
        Some(score) if score != cfg.missing_code => {
            if score < cfg.subthreshold_min {
                Group::Neurotypical
            } else if score < cfg.diagnosed_min {
                Group::Subthreshold
            } else {
                Group::Diagnosed
            }
        }
        _ if record.dx == Some(0.0) => Group::Neurotypical,
        _ => Group::Unknown,
    }
}

/// `sub-` followed by the zero-padded seven digit scan id
pub fn subject_id(scan_dir_id: u64) -> String {
    format!("sub-{:07}", scan_dir_id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CohortSubject {
    pub id: String,
    pub group: Group,
    pub record: PhenotypicRecord,
}

/// Group counts and age distribution of a cohort
#[derive(Debug, Clone, PartialEq)]
pub struct CohortSummary {
    pub total: usize,
    pub valid_scores: usize,
    pub group_counts: HashMap<Group, usize>,
    pub age_mean: Option<f64>,
    /// Sample standard deviation (n - 1)
    pub age_std: Option<f64>,
}

impl CohortSummary {
    pub fn count(&self, group: Group) -> usize {
        self.group_counts.get(&group).copied().unwrap_or(0)
    }

    pub fn render(&self, date: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "NYU ADHD-200 SAMPLE SUMMARY");
        let _ = writeln!(out, "Total subjects: {}", self.total);
        let _ = writeln!(out, "Valid ADHD scores: {}", self.valid_scores);
        out.push('\n');
        let _ = writeln!(out, "GROUP SIZES:");
        for group in [Group::Neurotypical, Group::Subthreshold, Group::Diagnosed] {
            let label = format!("{}:", group);
            let _ = writeln!(out, "  {:<15} {:3}", label, self.count(group));
        }
        out.push('\n');
        match (self.age_mean, self.age_std) {
            (Some(mean), Some(std)) => {
                let _ = writeln!(out, "Age: {:.1} ± {:.1} years", mean, std);
            }
            (Some(mean), None) => {
                let _ = writeln!(out, "Age: {:.1} years", mean);
            }
            _ => {
                let _ = writeln!(out, "Age: n/a");
            }
        }
        let _ = writeln!(out, "Date: {}", date);
        out
    }
}

/// The phenotypic table with a group assigned to every subject
#[derive(Debug, Clone, Default)]
pub struct Cohort {
    subjects: Vec<CohortSubject>,
    missing_code: f64,
}

fn parse_cell(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Cohort {
    /// Read the phenotypic CSV and classify every row
    pub fn load(path: &Path, cfg: &CohortConfig) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);
        let id_col = column(&cfg.id_column).ok_or_else(|| {
            PipelineError::InvalidCohort(format!("column '{}' not found", cfg.id_column))
        })?;
        let index_col = column(&cfg.index_column).ok_or_else(|| {
            PipelineError::InvalidCohort(format!("column '{}' not found", cfg.index_column))
        })?;
        let dx_col = column(DX_COLUMN);
        let age_col = column(AGE_COLUMN);
        let gender_col = column(GENDER_COLUMN);

        let mut subjects = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let scan_dir_id = match row.get(id_col).and_then(|v| v.trim().parse::<u64>().ok()) {
                Some(id) => id,
                None => {
                    warn!(
                        target: "neurograph-pipeline",
                        "Skipping row {} of {}: unreadable {}",
                        line + 2,
                        path.display(),
                        cfg.id_column
                    );
                    continue;
                }
            };
            let cell = |col: Option<usize>| parse_cell(col.and_then(|c| row.get(c)));
            let record = PhenotypicRecord {
                scan_dir_id,
                adhd_index: cell(Some(index_col)),
                dx: cell(dx_col),
                age: cell(age_col),
                gender: cell(gender_col),
            };
            subjects.push(CohortSubject {
                id: subject_id(scan_dir_id),
                group: classify(&record, cfg),
                record,
            });
        }

        let cohort = Self {
            subjects,
            missing_code: cfg.missing_code,
        };
        info!(
            target: "neurograph-pipeline",
            "Loaded {} subjects from {} ({} for analysis)",
            cohort.len(),
            path.display(),
            cohort.analysis_subjects().len()
        );
        Ok(cohort)
    }

    /// Build a cohort from records already in memory
    pub fn from_records(records: Vec<PhenotypicRecord>, cfg: &CohortConfig) -> Self {
        let subjects = records
            .into_iter()
            .map(|record| CohortSubject {
                id: subject_id(record.scan_dir_id),
                group: classify(&record, cfg),
                record,
            })
            .collect();
        Self {
            subjects,
            missing_code: cfg.missing_code,
        }
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn subjects(&self) -> &[CohortSubject] {
        &self.subjects
    }

    pub fn group_of(&self, subject: &str) -> Option<Group> {
        self.subjects
            .iter()
            .find(|s| s.id == subject)
            .map(|s| s.group)
    }

    /// Subject ids in `group`, in file order
    pub fn subjects_in(&self, group: Group) -> Vec<String> {
        self.subjects
            .iter()
            .filter(|s| s.group == group)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Subthreshold and Diagnosed subjects, in file order
    pub fn analysis_subjects(&self) -> Vec<String> {
        self.subjects
            .iter()
            .filter(|s| s.group.is_analysed())
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn summary(&self) -> CohortSummary {
        let mut group_counts = HashMap::new();
        for subject in &self.subjects {
            *group_counts.entry(subject.group).or_insert(0) += 1;
        }
        let valid_scores = self
            .subjects
            .iter()
            .filter(|s| matches!(s.record.adhd_index, Some(v) if v != self.missing_code))
            .count();

        let ages: Vec<f64> = self.subjects.iter().filter_map(|s| s.record.age).collect();
        let age_mean = if ages.is_empty() {
            None
        } else {
            Some(ages.iter().sum::<f64>() / ages.len() as f64)
        };
        let age_std = age_mean.filter(|_| ages.len() > 1).map(|mean| {
            let ss: f64 = ages.iter().map(|a| (a - mean) * (a - mean)).sum();
            (ss / (ages.len() - 1) as f64).sqrt()
        });

        CohortSummary {
            total: self.subjects.len(),
            valid_scores,
            group_counts,
            age_mean,
            age_std,
        }
    }

    /// Write the sample summary text file, creating parent directories
    pub fn write_summary(&self, path: &Path) -> PipelineResult<CohortSummary> {
        let summary = self.summary();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let date = Local::now().format("%Y-%m-%d").to_string();
        std::fs::write(path, summary.render(&date))?;
        info!(
            target: "neurograph-pipeline",
            "Sample summary saved to {}",
            path.display()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn record(id: u64, index: Option<f64>, dx: Option<f64>, age: Option<f64>) -> PhenotypicRecord {
        PhenotypicRecord {
            scan_dir_id: id,
            adhd_index: index,
            dx,
            age,
            gender: None,
        }
    }

    #[test]
    fn test_classify_boundaries() {
        let cfg = CohortConfig::default();
        let group = |v: f64| classify(&record(1, Some(v), None, None), &cfg);
        assert_eq!(group(39.9), Group::Neurotypical);
        assert_eq!(group(40.0), Group::Subthreshold);
        assert_eq!(group(59.9), Group::Subthreshold);
        assert_eq!(group(60.0), Group::Diagnosed);
    }

    #[test]
    fn test_classify_missing_code() {
        let cfg = CohortConfig::default();
        assert_eq!(
            classify(&record(1, Some(-999.0), Some(0.0), None), &cfg),
            Group::Neurotypical
        );
        assert_eq!(
            classify(&record(1, Some(-999.0), Some(1.0), None), &cfg),
            Group::Unknown
        );
        assert_eq!(classify(&record(1, None, None, None), &cfg), Group::Unknown);
    }

    #[test]
    fn test_subject_id_padding() {
        assert_eq!(subject_id(10001), "sub-0010001");
        assert_eq!(subject_id(1234567), "sub-1234567");
    }

    #[test]
    fn test_summary_counts_and_age() {
        let cfg = CohortConfig::default();
        let cohort = Cohort::from_records(
            vec![
                record(1, Some(45.0), Some(1.0), Some(8.0)),
                record(2, Some(65.0), Some(1.0), Some(10.0)),
                record(3, Some(-999.0), Some(0.0), Some(12.0)),
                record(4, Some(30.0), Some(0.0), None),
            ],
            &cfg,
        );
        let s = cohort.summary();
        assert_eq!(s.total, 4);
        assert_eq!(s.valid_scores, 3);
        assert_eq!(s.count(Group::Neurotypical), 2);
        assert_eq!(s.count(Group::Subthreshold), 1);
        assert_eq!(s.count(Group::Diagnosed), 1);
        assert_abs_diff_eq!(s.age_mean.unwrap(), 10.0);
        assert_abs_diff_eq!(s.age_std.unwrap(), 2.0);
        assert_eq!(cohort.analysis_subjects(), vec!["sub-0000001", "sub-0000002"]);

        let text = s.render("2026-01-11");
        assert!(text.starts_with("NYU ADHD-200 SAMPLE SUMMARY\nTotal subjects: 4\n"));
        assert!(text.contains("  Subthreshold:     1\n"));
        assert!(text.contains("Age: 10.0 ± 2.0 years\n"));
    }

    #[test]
    fn test_load_csv_by_header_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pheno.csv");
        std::fs::write(
            &path,
            "Site,ScanDir ID,Gender,Age,DX,ADHD Index\n\
             NYU,10001,1,9.5,1,52\n\
             NYU,10002,0,11.0,0,-999\n\
             NYU,10003,1,,1,71\n\
             NYU,10004,1,7.0,pending,\n",
        )
        .unwrap();

        let cohort = Cohort::load(&path, &CohortConfig::default()).unwrap();
        assert_eq!(cohort.len(), 4);
        assert_eq!(cohort.group_of("sub-0010001"), Some(Group::Subthreshold));
        assert_eq!(cohort.group_of("sub-0010002"), Some(Group::Neurotypical));
        assert_eq!(cohort.group_of("sub-0010003"), Some(Group::Diagnosed));
        assert_eq!(cohort.group_of("sub-0010004"), Some(Group::Unknown));
        assert_eq!(cohort.subjects()[2].record.age, None);
        assert_eq!(cohort.subjects_in(Group::Diagnosed), vec!["sub-0010003"]);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.csv");
        assert!(matches!(
            Cohort::load(&missing, &CohortConfig::default()),
            Err(PipelineError::MissingInput(p)) if p == missing
        ));

        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "ScanDir ID,Age\n10001,9\n").unwrap();
        assert!(matches!(
            Cohort::load(&path, &CohortConfig::default()),
            Err(PipelineError::InvalidCohort(_))
        ));
    }
}
