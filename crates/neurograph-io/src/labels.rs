//! Atlas region label lists (`<index>: <name>` per line)

use crate::error::{open_error, DataIoError, DataIoResult};
use std::path::Path;

/// One atlas region: integer value in the label volume plus its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLabel {
    pub index: u32,
    pub name: String,
}

impl RegionLabel {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// Read a label list. Blank lines and `#` comments are skipped; index 0
/// (background) is dropped.
pub fn read_labels(path: &Path) -> DataIoResult<Vec<RegionLabel>> {
    let text = std::fs::read_to_string(path).map_err(|e| open_error(path, e))?;
    parse_labels(&text)
}

pub(crate) fn parse_labels(text: &str) -> DataIoResult<Vec<RegionLabel>> {
    let mut labels = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (index, name) = line.split_once(':').ok_or_else(|| DataIoError::InvalidLabel {
            line: i + 1,
            reason: "expected '<index>: <name>'".to_string(),
        })?;
        let index = index.trim().parse::<u32>().map_err(|_| DataIoError::InvalidLabel {
            line: i + 1,
            reason: format!("'{}' is not a label index", index.trim()),
        })?;
        if index == 0 {
            continue;
        }
        if labels.iter().any(|l: &RegionLabel| l.index == index) {
            return Err(DataIoError::InvalidLabel {
                line: i + 1,
                reason: format!("duplicate label index {}", index),
            });
        }
        labels.push(RegionLabel::new(index, name.trim()));
    }
    Ok(labels)
}

pub fn write_labels(path: &Path, labels: &[RegionLabel]) -> DataIoResult<()> {
    let mut out = String::new();
    for label in labels {
        out.push_str(&format!("{}: {}\n", label.index, label.name));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, out)?;
    Ok(())
}
