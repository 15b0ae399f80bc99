use crate::core::io::discover::{self, InputFile};
use crate::core::io::output::OutputLayout;
use crate::core::io::reference::ReferenceTable;
use crate::core::io::traits::StructureParser;
use crate::engine::config::ValidationConfig;
use crate::engine::error::EngineError;
use crate::engine::pipeline::{self, BatchState, Candidate};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::report::Report;
use crate::engine::verdict::{ReasonFile, StructureRecord, Verdict};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// What to validate and where to put the results.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub reference_path: Option<PathBuf>,
    /// Defaults to the name of the input directory.
    pub model_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub report: Report,
    pub records: Vec<StructureRecord>,
    pub report_path: PathBuf,
    pub records_path: PathBuf,
}

/// Validates every structure file under `request.input_dir`.
///
/// Structures are screened in parallel, then folded in ascending id order through
/// deduplication, novelty and aggregation. Accepted and rejected source files are
/// copied into the output layout, and the report and per-structure records are written
/// at the end. Re-running with the same inputs reproduces the same output tree.
///
/// # Errors
///
/// Returns [`EngineError`] if the reference table cannot be loaded, the input directory
/// holds no structures, or the output directory cannot be written. Individual broken
/// structures never abort the run.
#[instrument(skip_all, name = "validation_workflow")]
pub fn run(
    request: &ValidationRequest,
    parser: &dyn StructureParser,
    config: &ValidationConfig,
    reporter: &ProgressReporter,
) -> Result<ValidationOutcome, EngineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });

    let reference = request
        .reference_path
        .as_deref()
        .map(ReferenceTable::load)
        .transpose()?;
    match &reference {
        Some(table) => info!(entries = table.len(), "Reference table loaded."),
        None => warn!("No reference table given; novelty will not be assessed."),
    }

    let inputs = exclude_output_tree(
        discover::discover_structures(&request.input_dir)?,
        &request.output_dir,
    );
    if inputs.is_empty() {
        return Err(EngineError::NoInputStructures(request.input_dir.clone()));
    }
    info!(count = inputs.len(), "Discovered input structures.");

    let layout = OutputLayout::new(&request.output_dir);
    layout.prepare()?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Per-structure screening ===
    let candidates = screen_all(inputs, parser, config, reporter);

    // === Phase 2: Ordered fold and routing ===
    let model_name = request
        .model_name
        .clone()
        .unwrap_or_else(|| default_model_name(&request.input_dir));
    let (mut report, records) = fold_all(&candidates, &model_name, reference.as_ref(), &layout, reporter)?;

    // === Phase 3: Summary files ===
    let records_path = layout.write_records(&records)?;
    report.all_structures_csv = Some(records_path.to_string_lossy().into_owned());
    let report_path = layout.write_report(&report)?;

    info!(
        total = report.n_total,
        validated = report.n_validated,
        rejected = report.n_rejected,
        "Validation complete."
    );
    Ok(ValidationOutcome {
        report,
        records,
        report_path,
        records_path,
    })
}

fn screen_all(
    inputs: Vec<InputFile>,
    parser: &dyn StructureParser,
    config: &ValidationConfig,
    reporter: &ProgressReporter,
) -> Vec<Candidate> {
    reporter.report(Progress::PhaseStart { name: "Screening" });
    reporter.report(Progress::TaskStart {
        total_steps: inputs.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = inputs.into_iter();

    #[cfg(feature = "parallel")]
    let iterator = inputs.into_par_iter();

    let candidates: Vec<Candidate> = iterator
        .map(|input| {
            let candidate = pipeline::evaluate(input, parser, config);
            reporter.report(Progress::TaskIncrement);
            candidate
        })
        .collect();

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    candidates
}

fn fold_all(
    candidates: &[Candidate],
    model_name: &str,
    reference: Option<&ReferenceTable>,
    layout: &OutputLayout,
    reporter: &ProgressReporter,
) -> Result<(Report, Vec<StructureRecord>), EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Deduplication & Routing",
    });

    let mut state = BatchState::new(model_name, reference);
    let mut records = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let decision = state.fold(candidate);
        let input = &candidate.input;
        match &decision.verdict {
            Verdict::Accepted => {
                layout.write_validated(&input.id, &input.path)?;
            }
            Verdict::Rejected(rejection) => {
                let reason_file = ReasonFile {
                    structure_id: &input.id,
                    reason: rejection.reason(),
                    details: rejection,
                };
                layout.write_rejected(&input.id, &input.path, &reason_file)?;
                reporter.report(Progress::StructureRejected {
                    id: input.id.clone(),
                    reason: rejection.reason(),
                });
            }
        }
        records.push(decision.record);
    }

    reporter.report(Progress::PhaseFinish);
    Ok((state.finish(), records))
}

/// Drops files that live under the output root, such as copies routed by an earlier run.
fn exclude_output_tree(inputs: Vec<InputFile>, output_dir: &Path) -> Vec<InputFile> {
    let Ok(output_root) = output_dir.canonicalize() else {
        return inputs;
    };
    let (excluded, kept): (Vec<_>, Vec<_>) = inputs.into_iter().partition(|input| {
        input
            .path
            .canonicalize()
            .is_ok_and(|path| path.starts_with(&output_root))
    });
    if !excluded.is_empty() {
        debug!(count = excluded.len(), "Ignoring structures inside the output directory.");
    }
    kept
}

fn default_model_name(input_dir: &Path) -> String {
    input_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::cif::CifParser;
    use crate::core::io::output::{REJECTED_DIR, VALIDATED_DIR};
    use crate::engine::config::{SymmetryConfig, SymmetryPolicy};
    use crate::engine::verdict::RejectionReason;
    use std::fmt::Write as _;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    fn cif(a: f64, declared: Option<u16>, sites: &[(&str, [f64; 3])]) -> String {
        let mut text = format!(
            "data_test\n_cell_length_a {a}\n_cell_length_b {a}\n_cell_length_c {a}\n\
             _cell_angle_alpha 90\n_cell_angle_beta 90\n_cell_angle_gamma 90\n"
        );
        if let Some(n) = declared {
            writeln!(text, "_space_group_IT_number {n}").unwrap();
        }
        text.push_str(
            "loop_\n_atom_site_type_symbol\n_atom_site_fract_x\n_atom_site_fract_y\n_atom_site_fract_z\n",
        );
        for (species, [x, y, z]) in sites {
            writeln!(text, "{species} {x} {y} {z}").unwrap();
        }
        text
    }

    fn fe2o3() -> String {
        cif(
            5.0,
            Some(167),
            &[
                ("Fe", [0.0, 0.0, 0.0]),
                ("Fe", [0.5, 0.5, 0.5]),
                ("O", [0.5, 0.0, 0.0]),
                ("O", [0.0, 0.5, 0.0]),
                ("O", [0.0, 0.0, 0.5]),
            ],
        )
    }

    fn rock_salt_nio() -> String {
        cif(
            4.17,
            None,
            &[
                ("Ni", [0.0, 0.0, 0.0]),
                ("Ni", [0.5, 0.5, 0.0]),
                ("Ni", [0.5, 0.0, 0.5]),
                ("Ni", [0.0, 0.5, 0.5]),
                ("O", [0.5, 0.0, 0.0]),
                ("O", [0.0, 0.5, 0.0]),
                ("O", [0.0, 0.0, 0.5]),
                ("O", [0.5, 0.5, 0.5]),
            ],
        )
    }

    fn overlapping() -> String {
        cif(5.0, None, &[("Na", [0.1, 0.2, 0.3]), ("Cl", [0.1, 0.2, 0.3])])
    }

    struct Fixture {
        _dir: TempDir,
        input: PathBuf,
        output: PathBuf,
        reference: PathBuf,
    }

    fn fixture(files: &[(&str, String)], reference_csv: &str) -> Fixture {
        let dir = tempdir().unwrap();
        let input = dir.path().join("mattergen");
        for (name, content) in files {
            let path = input.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        fs::create_dir_all(&input).unwrap();
        let reference = dir.path().join("reference.csv");
        fs::write(&reference, reference_csv).unwrap();
        Fixture {
            output: dir.path().join("out"),
            input,
            reference,
            _dir: dir,
        }
    }

    fn request(f: &Fixture, with_reference: bool) -> ValidationRequest {
        ValidationRequest {
            input_dir: f.input.clone(),
            output_dir: f.output.clone(),
            reference_path: with_reference.then(|| f.reference.clone()),
            model_name: None,
        }
    }

    fn declared() -> ValidationConfig {
        ValidationConfig {
            symmetry: SymmetryConfig {
                policy: SymmetryPolicy::Declared,
                ..SymmetryConfig::default()
            },
            ..ValidationConfig::default()
        }
    }

    fn run_with(f: &Fixture, with_reference: bool, config: &ValidationConfig) -> ValidationOutcome {
        run(
            &request(f, with_reference),
            &CifParser::new(),
            config,
            &ProgressReporter::new(),
        )
        .unwrap()
    }

    const NIO_REFERENCE: &str = "id,reduced_formula,spacegroup\nmp-19009,NiO,225\n";

    #[test]
    fn novel_structure_is_validated_and_later_copy_is_duplicate() {
        let f = fixture(&[("a.cif", fe2o3()), ("b.cif", fe2o3())], NIO_REFERENCE);
        let outcome = run_with(&f, true, &declared());
        let report = &outcome.report;

        assert_eq!(report.model_name, "mattergen");
        assert_eq!(report.n_total, 2);
        assert_eq!(report.n_validated, 1);
        assert_eq!(report.n_novel, 1);
        assert_eq!(report.novelty_ratio, 1.0);
        assert_eq!(report.duplicate_ratio, 0.5);
        assert_eq!(report.rejection_reasons.get(&RejectionReason::Duplicate), Some(&1));
        assert!(report.novelty_checked);

        assert!(f.output.join(VALIDATED_DIR).join("a.cif").is_file());
        assert!(f.output.join(REJECTED_DIR).join("b.cif").is_file());
        let reason: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(f.output.join(REJECTED_DIR).join("b.cif.reason.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(reason["structure_id"], "b.cif");
        assert_eq!(reason["reason"], "duplicate");
        assert_eq!(reason["details"]["first_seen"], "a.cif");
        assert_eq!(reason["details"]["fingerprint"], "Fe2O3#167");
    }

    #[test]
    fn structure_in_reference_is_known() {
        let f = fixture(
            &[("a.cif", fe2o3())],
            "id,reduced_formula,spacegroup\nmp-1234,Fe2O3,167\n",
        );
        let outcome = run_with(&f, true, &declared());
        assert_eq!(outcome.report.n_validated, 1);
        assert_eq!(outcome.report.n_novel, 0);
        assert_eq!(outcome.report.novelty_ratio, 0.0);
        assert_eq!(outcome.records[0].is_novel, Some(false));
    }

    #[test]
    fn detected_space_group_matches_reference() {
        let f = fixture(&[("nio.cif", rock_salt_nio())], NIO_REFERENCE);
        let outcome = run_with(&f, true, &ValidationConfig::default());
        let record = &outcome.records[0];
        assert_eq!(record.spacegroup, Some(225));
        assert_eq!(record.fingerprint.as_deref(), Some("NiO#225"));
        assert_eq!(record.is_novel, Some(false));
    }

    #[test]
    fn all_rejected_batch_has_null_averages() {
        let f = fixture(
            &[("broken.cif", "not a cif".to_string()), ("overlap.cif", overlapping())],
            NIO_REFERENCE,
        );
        let outcome = run_with(&f, false, &declared());
        let report = &outcome.report;

        assert_eq!(report.n_validated, 0);
        assert_eq!(report.avg_density, None);
        assert_eq!(report.avg_volume_per_atom, None);
        assert_eq!(report.rejection_reasons.get(&RejectionReason::Overlap), Some(&1));
        assert_eq!(
            report.rejection_reasons.get(&RejectionReason::CifParseError),
            Some(&1)
        );

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&outcome.report_path).unwrap()).unwrap();
        assert!(json["avg_density"].is_null());
        assert!(json["avg_volume_per_atom"].is_null());
        assert_eq!(json["rejection_reasons"]["overlap"], 1);
    }

    #[test]
    fn unknown_species_is_never_rejected_for_charge() {
        let f = fixture(
            &[("qq.cif", cif(5.0, None, &[("Qq", [0.0, 0.0, 0.0]), ("O", [0.5, 0.5, 0.5])]))],
            NIO_REFERENCE,
        );
        let outcome = run_with(&f, false, &declared());
        assert_eq!(
            outcome.records[0].rejection_reason,
            Some(RejectionReason::Other)
        );
        assert!(outcome.report.rejection_reasons.get(&RejectionReason::ChargeImbalance).is_none());
    }

    #[test]
    fn species_without_oxidation_states_pass_unchecked() {
        let f = fixture(
            &[("amo.cif", cif(5.0, None, &[("Am", [0.0, 0.0, 0.0]), ("O", [0.5, 0.5, 0.5])]))],
            NIO_REFERENCE,
        );
        let outcome = run_with(&f, false, &declared());
        let record = &outcome.records[0];

        assert_eq!(record.status, "validated");
        assert_eq!(record.rejection_reason, None);
        assert_eq!(record.charge_check, Some("unchecked"));
        assert_eq!(outcome.report.n_validated, 1);
        assert_eq!(outcome.report.n_charge_unchecked, 1);
        assert!(f.output.join(VALIDATED_DIR).join("amo.cif").is_file());
    }

    #[test]
    fn output_nested_in_input_is_not_rediscovered() {
        let f = fixture(&[("a.cif", fe2o3())], NIO_REFERENCE);
        let nested = ValidationRequest {
            output_dir: f.input.join("out"),
            ..request(&f, false)
        };
        let validate = || {
            run(&nested, &CifParser::new(), &declared(), &ProgressReporter::new()).unwrap()
        };

        let first = validate();
        assert!(nested.output_dir.join(VALIDATED_DIR).join("a.cif").is_file());
        let second = validate();

        assert_eq!(second.report.n_total, 1);
        assert!(second.report.rejection_reasons.is_empty());
        assert_eq!(first.report, second.report);
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn counts_are_consistent_for_a_mixed_batch() {
        let f = fixture(
            &[
                ("a.cif", fe2o3()),
                ("b.cif", fe2o3()),
                ("c.cif", overlapping()),
                ("d.cif", "data_x\n".to_string()),
                ("e.cif", rock_salt_nio()),
                ("f.cif", cif(5.0, None, &[("Na", [0.0, 0.0, 0.0]), ("Mg", [0.5, 0.5, 0.5])])),
            ],
            NIO_REFERENCE,
        );
        let outcome = run_with(&f, true, &declared());
        let report = &outcome.report;

        assert_eq!(report.n_total, 6);
        assert_eq!(report.n_validated + report.n_rejected, report.n_total);
        assert_eq!(
            report.rejection_reasons.values().sum::<usize>(),
            report.n_rejected
        );
        assert_eq!(outcome.records.len(), 6);
        let ids: Vec<_> = outcome.records.iter().map(|r| r.structure_id.as_str()).collect();
        assert_eq!(ids, ["a.cif", "b.cif", "c.cif", "d.cif", "e.cif", "f.cif"]);

        let csv = fs::read_to_string(&outcome.records_path).unwrap();
        assert_eq!(csv.lines().count(), 7);
        assert!(csv.lines().next().unwrap().starts_with("structure_id,input_path,status"));
    }

    #[test]
    fn nested_inputs_keep_their_relative_paths() {
        let f = fixture(
            &[("run1/a.cif", fe2o3()), ("run2/a.cif", overlapping())],
            NIO_REFERENCE,
        );
        let outcome = run_with(&f, false, &declared());
        assert_eq!(outcome.records[0].structure_id, "run1/a.cif");
        assert!(f.output.join(VALIDATED_DIR).join("run1/a.cif").is_file());
        assert!(f.output.join(REJECTED_DIR).join("run2/a.cif").is_file());
        assert!(f.output.join(REJECTED_DIR).join("run2/a.cif.reason.json").is_file());
    }

    #[test]
    fn rerun_converges_to_the_same_output() {
        let f = fixture(&[("a.cif", fe2o3()), ("b.cif", overlapping())], NIO_REFERENCE);
        let first = run_with(&f, true, &declared());

        let stale = f.output.join(VALIDATED_DIR).join("stale.cif");
        fs::write(&stale, "old").unwrap();
        let report_before = fs::read_to_string(&first.report_path).unwrap();

        let second = run_with(&f, true, &declared());
        assert!(!stale.exists());
        assert_eq!(first.report, second.report);
        assert_eq!(report_before, fs::read_to_string(&second.report_path).unwrap());
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn empty_input_directory_is_fatal() {
        let f = fixture(&[], NIO_REFERENCE);
        let err = run(
            &request(&f, false),
            &CifParser::new(),
            &declared(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NoInputStructures(_)));
        assert!(!f.output.exists());
    }

    #[test]
    fn invalid_reference_table_is_fatal() {
        let f = fixture(
            &[("a.cif", fe2o3())],
            "id,reduced_formula,spacegroup\nx,Xy2,1\n",
        );
        let err = run(
            &request(&f, true),
            &CifParser::new(),
            &declared(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Reference { .. }));
    }

    #[test]
    fn rejections_are_reported_as_progress_events() {
        let f = fixture(&[("a.cif", fe2o3()), ("b.cif", overlapping())], NIO_REFERENCE);
        let rejected = Mutex::new(Vec::new());
        let increments = Mutex::new(0u64);
        let reporter = ProgressReporter::with_callback(Box::new(|event| match event {
            Progress::StructureRejected { id, reason } => rejected.lock().unwrap().push((id, reason)),
            Progress::TaskIncrement => *increments.lock().unwrap() += 1,
            _ => {}
        }));
        run(&request(&f, false), &CifParser::new(), &declared(), &reporter).unwrap();
        drop(reporter);

        assert_eq!(increments.into_inner().unwrap(), 2);
        assert_eq!(
            rejected.into_inner().unwrap(),
            vec![("b.cif".to_string(), RejectionReason::Overlap)]
        );
    }
}
