use super::config::ValidationConfig;
use super::report::{Report, ReportAggregator};
use super::tasks::charge::{self, ChargeOutcome};
use super::tasks::dedup::DeduplicationEngine;
use super::tasks::descriptors::{self, Descriptors};
use super::tasks::fingerprint::{self, Fingerprint};
use super::tasks::geometry::{self, GeometryReport};
use super::tasks::novelty::{self, Novelty};
use super::tasks::symmetry::{self, SpaceGroupAssignment};
use super::verdict::{Rejection, StructureRecord, SuspicionFlag, Verdict};
use crate::core::io::discover::InputFile;
use crate::core::io::reference::ReferenceTable;
use crate::core::io::traits::StructureParser;
use crate::core::models::structure::Structure;
use tracing::{debug, trace};

/// Results of every per-structure stage for a structure that passed them all.
#[derive(Debug, Clone)]
pub struct Screened {
    pub geometry: GeometryReport,
    pub charge: ChargeOutcome,
    pub descriptors: Descriptors,
    pub space_group: Option<SpaceGroupAssignment>,
    pub fingerprint: Fingerprint,
}

impl Screened {
    pub fn flags(&self) -> impl Iterator<Item = SuspicionFlag> + '_ {
        self.geometry
            .flags
            .iter()
            .chain(&self.descriptors.flags)
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureSummary {
    pub n_atoms: usize,
    pub reduced_formula: String,
}

/// One input after the parallel phase, waiting to be folded into the batch.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub input: InputFile,
    /// Present whenever the file could be turned into a valid [`Structure`].
    pub summary: Option<StructureSummary>,
    pub outcome: Result<Screened, Rejection>,
}

/// Reads, parses and builds the structure for `input`.
pub fn load(input: &InputFile, parser: &dyn StructureParser) -> Result<Structure, Rejection> {
    let parsed = parser
        .parse_path(&input.path)
        .map_err(|e| Rejection::Parse {
            message: e.to_string(),
        })?;
    Structure::from_parsed(input.id.clone(), parsed).map_err(|e| Rejection::Sanity {
        message: e.to_string(),
    })
}

/// Runs the batch-independent stages in order, stopping at the first failure.
pub fn screen(structure: &Structure, config: &ValidationConfig) -> Result<Screened, Rejection> {
    let geometry = geometry::run(structure, &config.geometry)?;

    let charge = charge::run(&structure.composition(), &config.charge);
    match &charge {
        ChargeOutcome::Imbalanced { residual } => {
            return Err(Rejection::ChargeImbalance {
                policy: config.charge.policy.as_str(),
                residual: *residual,
            });
        }
        ChargeOutcome::Unchecked(reason) => {
            debug!(id = structure.id(), ?reason, "Charge neutrality not checked");
        }
        ChargeOutcome::Balanced { .. } => {}
    }

    let descriptors = descriptors::run(structure, &config.descriptors)?;
    let space_group = symmetry::assign(structure, &config.symmetry);
    let fingerprint = fingerprint::compute(
        structure,
        space_group.map(|sg| sg.number),
        &config.symmetry,
    );

    Ok(Screened {
        geometry,
        charge,
        descriptors,
        space_group,
        fingerprint,
    })
}

/// Loads and screens a single input. Never fails: problems become rejections.
pub fn evaluate(
    input: InputFile,
    parser: &dyn StructureParser,
    config: &ValidationConfig,
) -> Candidate {
    let structure = match load(&input, parser) {
        Ok(structure) => structure,
        Err(rejection) => {
            return Candidate {
                input,
                summary: None,
                outcome: Err(rejection),
            };
        }
    };
    let summary = StructureSummary {
        n_atoms: structure.num_sites(),
        reduced_formula: structure.reduced_formula(),
    };
    let outcome = screen(&structure, config);
    Candidate {
        input,
        summary: Some(summary),
        outcome,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub verdict: Verdict,
    pub record: StructureRecord,
}

/// Run state of the order-dependent stages: the deduplication seen-set and the
/// report aggregator. Candidates must be folded in ascending id order.
pub struct BatchState<'r> {
    dedup: DeduplicationEngine,
    reference: Option<&'r ReferenceTable>,
    aggregator: ReportAggregator,
}

impl<'r> BatchState<'r> {
    pub fn new(model_name: impl Into<String>, reference: Option<&'r ReferenceTable>) -> Self {
        Self {
            dedup: DeduplicationEngine::new(),
            reference,
            aggregator: ReportAggregator::new(model_name, reference.is_some()),
        }
    }

    pub fn fold(&mut self, candidate: &Candidate) -> Decision {
        let mut record = StructureRecord {
            structure_id: candidate.input.id.clone(),
            input_path: candidate.input.path.to_string_lossy().into_owned(),
            ..StructureRecord::default()
        };
        if let Some(summary) = &candidate.summary {
            record.n_atoms = Some(summary.n_atoms);
            record.reduced_formula = Some(summary.reduced_formula.clone());
        }

        let verdict = match &candidate.outcome {
            Err(rejection) => Verdict::Rejected(rejection.clone()),
            Ok(screened) => {
                fill_screened(&mut record, screened);
                match self.dedup.check(&candidate.input.id, &screened.fingerprint) {
                    Err(duplicate) => {
                        record.is_duplicate = true;
                        Verdict::Rejected(duplicate)
                    }
                    Ok(()) => {
                        let novelty = novelty::classify(&screened.fingerprint, self.reference);
                        if let Some(Novelty::Known(reference_id)) = &novelty {
                            trace!(id = %candidate.input.id, reference_id = %reference_id, "Matches reference entry");
                        }
                        record.is_novel = novelty.as_ref().map(Novelty::is_novel);
                        Verdict::Accepted
                    }
                }
            }
        };

        match &verdict {
            Verdict::Accepted => record.status = "validated",
            Verdict::Rejected(rejection) => {
                record.status = "rejected";
                record.rejection_reason = Some(rejection.reason());
                record.details = Some(rejection.to_string());
                if let Rejection::ChargeImbalance { .. } = rejection {
                    record.charge_check = Some("imbalanced");
                }
            }
        }

        self.aggregator.add(&record);
        Decision { verdict, record }
    }

    pub fn finish(self) -> Report {
        debug!(
            unique_fingerprints = self.dedup.len(),
            "Batch fold complete."
        );
        self.aggregator.finish()
    }
}

fn fill_screened(record: &mut StructureRecord, screened: &Screened) {
    let flags: Vec<&str> = screened.flags().map(|f| f.as_str()).collect();
    record.is_suspicious = !flags.is_empty();
    record.suspicion_flags = flags.join(";");
    record.is_magnetic = Some(screened.descriptors.is_magnetic);
    record.density = Some(screened.descriptors.density);
    record.volume_per_atom = Some(screened.descriptors.volume_per_atom);
    record.min_distance = Some(screened.geometry.min_distance);
    record.spacegroup = screened.space_group.map(|sg| sg.number);
    record.fingerprint = Some(screened.fingerprint.to_string());
    record.charge_check = Some(screened.charge.label());
    record.charge_solution = screened.charge.solution();
}
