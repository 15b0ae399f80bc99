use crate::core::io::discover::{self, InputFile};
use crate::core::io::reference::{ReferenceRecord, ReferenceTable};
use crate::core::io::traits::StructureParser;
use crate::engine::config::SymmetryConfig;
use crate::engine::error::EngineError;
use crate::engine::pipeline;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::symmetry;
use crate::engine::verdict::Rejection;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct ReferenceBuild {
    pub records: Vec<ReferenceRecord>,
    /// Inputs that could not be read, with the reason they were left out.
    pub skipped: Vec<(String, String)>,
    pub output_path: PathBuf,
}

/// Builds a reference table from a directory of known structures and writes it as CSV.
///
/// Every `*.cif` file below `input_dir` contributes one row: its relative path as id, its
/// reduced formula, and the space group assigned under `symmetry`. Files that cannot be
/// parsed are skipped with a warning.
///
/// # Errors
///
/// Returns [`EngineError`] if the directory cannot be searched, contains no structure
/// files, or the CSV cannot be written.
#[instrument(skip_all, name = "reference_workflow")]
pub fn build(
    input_dir: &Path,
    output_path: &Path,
    parser: &dyn StructureParser,
    symmetry: &SymmetryConfig,
    reporter: &ProgressReporter,
) -> Result<ReferenceBuild, EngineError> {
    let inputs = discover::discover_structures(input_dir)?;
    if inputs.is_empty() {
        return Err(EngineError::NoInputStructures(input_dir.to_path_buf()));
    }

    reporter.report(Progress::PhaseStart {
        name: "Building Reference",
    });
    reporter.report(Progress::TaskStart {
        total_steps: inputs.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = inputs.iter();

    #[cfg(feature = "parallel")]
    let iterator = inputs.par_iter();

    let results: Vec<Result<ReferenceRecord, Rejection>> = iterator
        .map(|input| {
            let record = describe(input, parser, symmetry);
            reporter.report(Progress::TaskIncrement);
            record
        })
        .collect();

    reporter.report(Progress::TaskFinish);

    let mut records = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for (input, result) in inputs.iter().zip(results) {
        match result {
            Ok(record) => records.push(record),
            Err(rejection) => {
                warn!(id = %input.id, reason = %rejection, "Skipping unreadable reference structure.");
                skipped.push((input.id.clone(), rejection.to_string()));
            }
        }
    }

    ReferenceTable::write_csv(&records, output_path)?;
    reporter.report(Progress::PhaseFinish);

    info!(
        written = records.len(),
        skipped = skipped.len(),
        path = %output_path.display(),
        "Reference table written."
    );
    Ok(ReferenceBuild {
        records,
        skipped,
        output_path: output_path.to_path_buf(),
    })
}

fn describe(
    input: &InputFile,
    parser: &dyn StructureParser,
    symmetry: &SymmetryConfig,
) -> Result<ReferenceRecord, Rejection> {
    let structure = pipeline::load(input, parser)?;
    Ok(ReferenceRecord {
        id: input.id.clone(),
        reduced_formula: structure.reduced_formula(),
        spacegroup: symmetry::assign(&structure, symmetry).map(|sg| sg.number),
    })
}
