use super::fingerprint::Fingerprint;
use crate::engine::verdict::Rejection;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Remembers the first structure seen for every fingerprint in a batch.
///
/// Structures must be offered in ascending id order for the result to be
/// reproducible: the first occurrence wins and is never affected by later ones.
#[derive(Debug, Default)]
pub struct DeduplicationEngine {
    seen: HashMap<Fingerprint, String>,
}

impl DeduplicationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` under `fingerprint`, or rejects it as a duplicate of the
    /// structure that claimed the fingerprint first.
    pub fn check(&mut self, id: &str, fingerprint: &Fingerprint) -> Result<(), Rejection> {
        match self.seen.entry(fingerprint.clone()) {
            Entry::Occupied(first) => Err(Rejection::Duplicate {
                first_seen: first.get().clone(),
                fingerprint: fingerprint.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(id.to_string());
                Ok(())
            }
        }
    }

    /// Number of distinct fingerprints registered so far.
    pub(crate) fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tasks::fingerprint::SymmetryKey;
    use std::collections::BTreeSet;

    fn fp(formula: &str, sg: u16) -> Fingerprint {
        Fingerprint {
            formula: formula.to_string(),
            symmetry: SymmetryKey::SpaceGroup(sg),
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let mut engine = DeduplicationEngine::new();
        assert!(engine.check("a.cif", &fp("Fe2O3", 167)).is_ok());
        assert_eq!(
            engine.check("b.cif", &fp("Fe2O3", 167)),
            Err(Rejection::Duplicate {
                first_seen: "a.cif".into(),
                fingerprint: "Fe2O3#167".into()
            })
        );
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn different_symmetry_is_not_a_duplicate() {
        let mut engine = DeduplicationEngine::new();
        assert!(engine.check("a.cif", &fp("Fe2O3", 167)).is_ok());
        assert!(engine.check("b.cif", &fp("Fe2O3", 15)).is_ok());
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn sorted_batches_give_the_same_outcome_set_regardless_of_arrival_order() {
        let batch = [
            ("c.cif", fp("NiO", 225)),
            ("a.cif", fp("Fe2O3", 167)),
            ("d.cif", fp("Fe2O3", 167)),
            ("b.cif", fp("NiO", 225)),
        ];

        let outcome = |mut items: Vec<(&'static str, Fingerprint)>| {
            items.sort_by(|x, y| x.0.cmp(y.0));
            let mut engine = DeduplicationEngine::new();
            items
                .iter()
                .filter(|(id, f)| engine.check(id, f).is_err())
                .map(|(id, _)| *id)
                .collect::<BTreeSet<_>>()
        };

        let forward = outcome(batch.to_vec());
        let mut reversed = batch.to_vec();
        reversed.reverse();
        assert_eq!(forward, outcome(reversed));
        assert_eq!(forward, BTreeSet::from(["c.cif", "d.cif"]));
    }
}
