use super::verdict::{RejectionReason, StructureRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Summary of a validation run, written as `validation_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub model_name: String,
    pub n_total: usize,
    pub n_validated: usize,
    pub n_rejected: usize,
    pub validity_ratio: f64,
    /// Share of validated structures containing a magnetic element.
    pub magnetic_ratio: f64,
    /// Share of validated structures absent from the reference set; `0` when novelty
    /// was not assessed.
    pub novelty_ratio: f64,
    /// Duplicates over all inputs.
    pub duplicate_ratio: f64,
    pub avg_density: Option<f64>,
    pub avg_volume_per_atom: Option<f64>,
    pub rejection_reasons: BTreeMap<RejectionReason, usize>,
    pub n_magnetic: usize,
    pub n_novel: usize,
    pub n_suspicious: usize,
    pub n_charge_unchecked: usize,
    pub novelty_checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_structures_csv: Option<String>,
}

/// Accumulates per-structure records into a [`Report`].
#[derive(Debug)]
pub struct ReportAggregator {
    model_name: String,
    novelty_checked: bool,
    n_total: usize,
    n_validated: usize,
    n_magnetic: usize,
    n_novel: usize,
    n_suspicious: usize,
    n_charge_unchecked: usize,
    density_sum: f64,
    volume_per_atom_sum: f64,
    rejection_reasons: BTreeMap<RejectionReason, usize>,
}

impl ReportAggregator {
    pub fn new(model_name: impl Into<String>, novelty_checked: bool) -> Self {
        Self {
            model_name: model_name.into(),
            novelty_checked,
            n_total: 0,
            n_validated: 0,
            n_magnetic: 0,
            n_novel: 0,
            n_suspicious: 0,
            n_charge_unchecked: 0,
            density_sum: 0.0,
            volume_per_atom_sum: 0.0,
            rejection_reasons: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, record: &StructureRecord) {
        self.n_total += 1;
        if record.is_suspicious {
            self.n_suspicious += 1;
        }
        if record.charge_check == Some("unchecked") {
            self.n_charge_unchecked += 1;
        }

        if let Some(reason) = record.rejection_reason {
            *self.rejection_reasons.entry(reason).or_insert(0) += 1;
            return;
        }

        self.n_validated += 1;
        if record.is_magnetic == Some(true) {
            self.n_magnetic += 1;
        }
        if record.is_novel == Some(true) {
            self.n_novel += 1;
        }
        self.density_sum += record.density.unwrap_or_default();
        self.volume_per_atom_sum += record.volume_per_atom.unwrap_or_default();
    }

    pub fn finish(self) -> Report {
        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        let average = |sum: f64| (self.n_validated > 0).then(|| sum / self.n_validated as f64);
        let n_duplicates = self
            .rejection_reasons
            .get(&RejectionReason::Duplicate)
            .copied()
            .unwrap_or(0);

        Report {
            n_rejected: self.n_total - self.n_validated,
            validity_ratio: ratio(self.n_validated, self.n_total),
            magnetic_ratio: ratio(self.n_magnetic, self.n_validated),
            novelty_ratio: if self.novelty_checked {
                ratio(self.n_novel, self.n_validated)
            } else {
                0.0
            },
            duplicate_ratio: ratio(n_duplicates, self.n_total),
            avg_density: average(self.density_sum),
            avg_volume_per_atom: average(self.volume_per_atom_sum),
            model_name: self.model_name,
            n_total: self.n_total,
            n_validated: self.n_validated,
            rejection_reasons: self.rejection_reasons,
            n_magnetic: self.n_magnetic,
            n_novel: self.n_novel,
            n_suspicious: self.n_suspicious,
            n_charge_unchecked: self.n_charge_unchecked,
            novelty_checked: self.novelty_checked,
            all_structures_csv: None,
        }
    }
}
