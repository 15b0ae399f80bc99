use super::fingerprint::Fingerprint;
use crate::core::io::reference::ReferenceTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Novelty {
    Novel,
    /// Matches the reference entry with this id.
    Known(String),
}

impl Novelty {
    pub fn is_novel(&self) -> bool {
        matches!(self, Self::Novel)
    }
}

/// Classifies a fingerprint against the reference set. Returns `None` when no
/// reference set is configured, meaning novelty is not assessed.
pub fn classify(fingerprint: &Fingerprint, reference: Option<&ReferenceTable>) -> Option<Novelty> {
    let table = reference?;
    let novelty = match table.find(&fingerprint.formula, fingerprint.space_group()) {
        Some(record) => Novelty::Known(record.id.clone()),
        None => Novelty::Novel,
    };
    Some(novelty)
}
