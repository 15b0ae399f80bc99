use crate::core::models::composition::{Composition, FormulaError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReferenceLoadError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid reference table '{path}': {source}")]
    Row {
        path: String,
        source: ReferenceRowError,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ReferenceRowError {
    #[error("Duplicate reference id '{0}'")]
    DuplicateId(String),
    #[error("Reference row has an empty id")]
    EmptyId,
    #[error("Invalid formula '{formula}' for reference '{id}': {source}")]
    InvalidFormula {
        id: String,
        formula: String,
        source: FormulaError,
    },
    #[error("Invalid space group '{value}' for reference '{id}'")]
    InvalidSpaceGroup { id: String, value: String },
}

/// One known structure of the reference (training) set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub id: String,
    pub reduced_formula: String,
    pub spacegroup: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawReferenceRow {
    id: String,
    reduced_formula: String,
    #[serde(default)]
    spacegroup: Option<String>,
}

/// The reference set, indexed by canonical reduced formula.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    records: Vec<ReferenceRecord>,
    by_formula: HashMap<String, Vec<usize>>,
}

impl ReferenceTable {
    /// Loads a reference table from a CSV file with the columns `id`, `reduced_formula`
    /// and an optional `spacegroup`.
    ///
    /// Formulas are re-canonicalized on load, so `O3Fe2` and `Fe2O3` are the same entry.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceLoadError`] if the file cannot be read, a row is malformed, an id
    /// repeats, or a formula or space group cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, ReferenceLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let mut reader = csv::Reader::from_path(path).map_err(|e| ReferenceLoadError::Csv {
            path: path_str.clone(),
            source: e,
        })?;

        let mut rows = Vec::new();
        for result in reader.deserialize::<RawReferenceRow>() {
            let row = result.map_err(|e| ReferenceLoadError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
            let record = canonicalize(row).map_err(|e| ReferenceLoadError::Row {
                path: path_str.clone(),
                source: e,
            })?;
            rows.push(record);
        }

        Self::from_records(rows).map_err(|e| ReferenceLoadError::Row {
            path: path_str,
            source: e,
        })
    }

    /// Builds a table from records whose formulas are already canonical.
    pub fn from_records(records: Vec<ReferenceRecord>) -> Result<Self, ReferenceRowError> {
        let mut seen = HashSet::new();
        let mut by_formula: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            if !seen.insert(record.id.as_str()) {
                return Err(ReferenceRowError::DuplicateId(record.id.clone()));
            }
            by_formula
                .entry(record.reduced_formula.clone())
                .or_default()
                .push(index);
        }
        Ok(Self {
            records,
            by_formula,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ReferenceRecord] {
        &self.records
    }

    /// Finds the first reference entry with `formula` whose space group equals
    /// `space_group`. Entries without a space group match on formula alone.
    pub fn find(&self, formula: &str, space_group: Option<u16>) -> Option<&ReferenceRecord> {
        self.by_formula
            .get(formula)?
            .iter()
            .map(|&i| &self.records[i])
            .find(|r| r.spacegroup.is_none() || r.spacegroup == space_group)
    }

    /// Writes records as a reference CSV readable by [`ReferenceTable::load`].
    pub fn write_csv(records: &[ReferenceRecord], path: &Path) -> Result<(), ReferenceLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let to_err = |e: csv::Error| ReferenceLoadError::Csv {
            path: path_str.clone(),
            source: e,
        };
        let mut writer = csv::Writer::from_path(path).map_err(to_err)?;
        for record in records {
            writer.serialize(record).map_err(to_err)?;
        }
        writer.flush().map_err(|e| to_err(e.into()))?;
        Ok(())
    }
}

fn canonicalize(row: RawReferenceRow) -> Result<ReferenceRecord, ReferenceRowError> {
    let id = row.id.trim().to_string();
    if id.is_empty() {
        return Err(ReferenceRowError::EmptyId);
    }

    let reduced_formula = Composition::parse_formula(&row.reduced_formula)
        .map_err(|source| ReferenceRowError::InvalidFormula {
            id: id.clone(),
            formula: row.reduced_formula.clone(),
            source,
        })?
        .reduced_formula();

    let spacegroup = match row.spacegroup.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => Some(parse_space_group(value).ok_or_else(|| {
            ReferenceRowError::InvalidSpaceGroup {
                id: id.clone(),
                value: value.to_string(),
            }
        })?),
    };

    Ok(ReferenceRecord {
        id,
        reduced_formula,
        spacegroup,
    })
}

// Accepts "167" as well as "167.0", which spreadsheet exports tend to produce.
fn parse_space_group(value: &str) -> Option<u16> {
    let number: f64 = value.parse().ok()?;
    if number.fract() != 0.0 || !(1.0..=230.0).contains(&number) {
        return None;
    }
    Some(number as u16)
}
