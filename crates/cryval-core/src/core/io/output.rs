use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const VALIDATED_DIR: &str = "validated_structures";
pub const REJECTED_DIR: &str = "rejected_structures";
pub const REPORT_FILE: &str = "validation_report.json";
pub const RECORDS_FILE: &str = "all_structures.csv";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("File I/O error for '{path}': {source}")]
    Io { path: String, source: io::Error },
    #[error("CSV writing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("JSON writing error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

/// Layout of a run's output directory:
///
/// ```text
/// <root>/validated_structures/<id>
/// <root>/rejected_structures/<id>
/// <root>/rejected_structures/<id>.reason.json
/// <root>/all_structures.csv
/// <root>/validation_report.json
/// ```
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn validated_dir(&self) -> PathBuf {
        self.root.join(VALIDATED_DIR)
    }

    pub fn rejected_dir(&self) -> PathBuf {
        self.root.join(REJECTED_DIR)
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }

    pub fn records_path(&self) -> PathBuf {
        self.root.join(RECORDS_FILE)
    }

    /// Creates the output root and empties both routing directories, so that a
    /// re-run over the same inputs produces the same tree.
    pub fn prepare(&self) -> Result<(), OutputError> {
        fs::create_dir_all(&self.root).map_err(io_err(&self.root))?;
        for dir in [self.validated_dir(), self.rejected_dir()] {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(io_err(&dir))?;
            }
            fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        }
        Ok(())
    }

    pub fn write_validated(&self, id: &str, source: &Path) -> Result<PathBuf, OutputError> {
        let destination = self.validated_dir().join(id);
        copy_into(source, &destination)?;
        Ok(destination)
    }

    /// Copies a rejected source file and writes its sibling `<file name>.reason.json`.
    pub fn write_rejected<R: Serialize>(
        &self,
        id: &str,
        source: &Path,
        reason: &R,
    ) -> Result<PathBuf, OutputError> {
        let destination = self.rejected_dir().join(id);
        copy_into(source, &destination)?;
        write_json(&reason_path(&destination), reason)?;
        Ok(destination)
    }

    pub fn write_report<R: Serialize>(&self, report: &R) -> Result<PathBuf, OutputError> {
        let path = self.report_path();
        write_json(&path, report)?;
        Ok(path)
    }

    pub fn write_records<R: Serialize>(&self, records: &[R]) -> Result<PathBuf, OutputError> {
        let path = self.records_path();
        let to_err = |source: csv::Error| OutputError::Csv {
            path: path.to_string_lossy().to_string(),
            source,
        };
        let mut writer = csv::Writer::from_path(&path).map_err(to_err)?;
        for record in records {
            writer.serialize(record).map_err(to_err)?;
        }
        writer.flush().map_err(io_err(&path))?;
        Ok(path)
    }
}

/// Appends `.reason.json` to the full file name, so `a.cif` and `a.CIF` never share one.
fn reason_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".reason.json");
    PathBuf::from(name)
}

fn copy_into(source: &Path, destination: &Path) -> Result<(), OutputError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::copy(source, destination).map_err(io_err(source))?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| OutputError::Json {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    fs::write(path, json).map_err(io_err(path))
}
