//! Batch run logs
//!
//! Every batch stage writes a plain-text summary. The list under
//! `SUCCESSFUL SUBJECTS:` is what the next stage processes.

use crate::error::{open_error, DataIoResult};
use chrono::Local;
use std::fmt::Write as _;
use std::path::Path;

pub const SUCCESSFUL_MARKER: &str = "SUCCESSFUL SUBJECTS:";
pub const FAILED_MARKER: &str = "FAILED SUBJECTS:";
const SUBJECT_PREFIX: &str = "sub-";

/// Summary of one batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunLog {
    pub title: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub date: String,
    /// Ordered `key: value` lines written after the date
    pub fields: Vec<(String, String)>,
    pub successful: Vec<String>,
    pub failed: Vec<String>,
}

impl RunLog {
    /// New log stamped with the current local time
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ..Default::default()
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "Date: {}", self.date);
        for (key, value) in &self.fields {
            let _ = writeln!(out, "{}: {}", key, value);
        }
        out.push('\n');
        let _ = writeln!(out, "{}", SUCCESSFUL_MARKER);
        for subject in &self.successful {
            let _ = writeln!(out, "{}", subject);
        }
        if !self.failed.is_empty() {
            out.push('\n');
            let _ = writeln!(out, "{}", FAILED_MARKER);
            for subject in &self.failed {
                let _ = writeln!(out, "{}", subject);
            }
        }
        out
    }

    pub fn write(&self, path: &Path) -> DataIoResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.render())?;
        Ok(())
    }

    /// Parse a rendered log; unknown lines are ignored
    pub fn parse(text: &str) -> Self {
        let mut log = RunLog::default();
        let mut lines = text.lines();
        if let Some(title) = lines.next() {
            log.title = title.trim().to_string();
        }

        #[derive(PartialEq)]
        enum Section {
            Fields,
            Successful,
            Failed,
        }
        let mut section = Section::Fields;

        for line in lines {
            let line = line.trim();
            if line == SUCCESSFUL_MARKER {
                section = Section::Successful;
                continue;
            }
            if line == FAILED_MARKER {
                section = Section::Failed;
                continue;
            }
            match section {
                Section::Fields => {
                    if let Some((key, value)) = line.split_once(':') {
                        let (key, value) = (key.trim(), value.trim());
                        if key == "Date" {
                            log.date = value.to_string();
                        } else {
                            log.fields.push((key.to_string(), value.to_string()));
                        }
                    }
                }
                Section::Successful if line.starts_with(SUBJECT_PREFIX) => {
                    log.successful.push(line.to_string())
                }
                Section::Failed if line.starts_with(SUBJECT_PREFIX) => {
                    log.failed.push(line.to_string())
                }
                _ => {}
            }
        }
        log
    }

    pub fn read(path: &Path) -> DataIoResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| open_error(path, e))?;
        Ok(Self::parse(&text))
    }

    /// Value of a `key: value` field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Subject ids listed under `SUCCESSFUL SUBJECTS:` (stops at `FAILED SUBJECTS:`)
pub fn read_successful_subjects(path: &Path) -> DataIoResult<Vec<String>> {
    Ok(RunLog::read(path)?.successful)
}

/// `Failed Subjects` list written next to the preprocessing log
pub fn write_failed_subjects(path: &Path, failed: &[String]) -> DataIoResult<()> {
    let mut out = String::from("Failed Subjects\n");
    for subject in failed {
        out.push_str(subject);
        out.push('\n');
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_layout() {
        let mut log = RunLog::new("TIME SERIES EXTRACTION LOG")
            .field("Total subjects", 3)
            .field("Successful", 2);
        log.date = "2026-01-20 10:00:00".to_string();
        log.successful = vec!["sub-0010001".into(), "sub-0010002".into()];
        log.failed = vec!["sub-0010003".into()];

        let expected = "TIME SERIES EXTRACTION LOG\n\
Date: 2026-01-20 10:00:00\n\
Total subjects: 3\n\
Successful: 2\n\
\n\
SUCCESSFUL SUBJECTS:\n\
sub-0010001\n\
sub-0010002\n\
\n\
FAILED SUBJECTS:\n\
sub-0010003\n";
        assert_eq!(log.render(), expected);
        assert_eq!(RunLog::parse(&expected), log);
    }

    #[test]
    fn test_successful_section_stops_at_failed() {
        // Preprocessing logs have no blank line before the failed section
        let text = "PREPROCESSING LOG\nDate: 2026-01-12 09:00:00\nTotal subjects: 3\n\
SUCCESSFUL SUBJECTS:\nsub-0010001\nsub-0010042\nFAILED SUBJECTS:\nsub-0010050\n";
        let log = RunLog::parse(text);
        assert_eq!(log.successful, vec!["sub-0010001", "sub-0010042"]);
        assert_eq!(log.failed, vec!["sub-0010050"]);
        assert_eq!(log.get("Total subjects"), Some("3"));
    }

    #[test]
    fn test_read_successful_subjects_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("extraction_log.txt");
        let mut log = RunLog::new("TIME SERIES EXTRACTION LOG");
        log.successful = vec!["sub-0010001".into()];
        log.write(&path).unwrap();

        assert_eq!(read_successful_subjects(&path).unwrap(), vec!["sub-0010001"]);
    }

    #[test]
    fn test_failed_subjects_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed_subjects.txt");
        write_failed_subjects(&path, &["sub-0010009".to_string()]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Failed Subjects\nsub-0010009\n"
        );
    }
}
