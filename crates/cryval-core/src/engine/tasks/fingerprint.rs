use crate::core::models::structure::Structure;
use crate::engine::config::SymmetryConfig;
use std::fmt;

/// The symmetry half of a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymmetryKey {
    SpaceGroup(u16),
    /// Sorted rounded cell lengths and sorted rounded cell angles, used when no space
    /// group is available.
    Lattice(String),
}

/// Canonical identity of a structure for deduplication and novelty lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub formula: String,
    pub symmetry: SymmetryKey,
}

impl Fingerprint {
    pub fn space_group(&self) -> Option<u16> {
        match self.symmetry {
            SymmetryKey::SpaceGroup(n) => Some(n),
            SymmetryKey::Lattice(_) => None,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symmetry {
            SymmetryKey::SpaceGroup(n) => write!(f, "{}#{}", self.formula, n),
            SymmetryKey::Lattice(sig) => write!(f, "{}#{}", self.formula, sig),
        }
    }
}

/// Builds the fingerprint of `structure` from its reduced formula and either the
/// assigned space group or a rounded lattice signature.
pub fn compute(structure: &Structure, space_group: Option<u16>, config: &SymmetryConfig) -> Fingerprint {
    let symmetry = match space_group {
        Some(n) => SymmetryKey::SpaceGroup(n),
        None => SymmetryKey::Lattice(lattice_signature(structure, config)),
    };
    Fingerprint {
        formula: structure.reduced_formula(),
        symmetry,
    }
}

fn lattice_signature(structure: &Structure, config: &SymmetryConfig) -> String {
    let mut lengths = structure.lattice().lengths();
    let mut angles = structure.lattice().angles();
    lengths.sort_by(f64::total_cmp);
    angles.sort_by(f64::total_cmp);

    let fmt_all = |values: [f64; 3], decimals: usize| {
        values
            .iter()
            .map(|v| format!("{v:.decimals$}"))
            .collect::<Vec<_>>()
            .join("-")
    };
    format!(
        "L{}/{}",
        fmt_all(lengths, config.length_decimals as usize),
        fmt_all(angles, config.angle_decimals as usize)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::lattice::Lattice;
    use crate::core::models::site::Site;
    use nalgebra::Vector3;
    use proptest::prelude::*;

    const SPECIES: [&str; 4] = ["Fe", "O", "Ni", "Li"];

    fn build(lengths: [f64; 3], angles: [f64; 3], sites: &[(usize, [f64; 3])]) -> Structure {
        let lattice = Lattice::from_parameters(lengths, angles);
        let sites = sites
            .iter()
            .map(|(s, f)| Site::new(SPECIES[*s], Vector3::from(*f), 1.0))
            .collect();
        Structure::new("fp", lattice, sites, None).unwrap()
    }

    #[test]
    fn display_joins_formula_and_space_group() {
        let s = build(
            [5.0, 5.0, 13.7],
            [90.0, 90.0, 120.0],
            &[(0, [0.0, 0.0, 0.35]), (0, [0.0, 0.0, 0.65]), (1, [0.3, 0.0, 0.25]), (1, [0.0, 0.3, 0.25]), (1, [0.7, 0.7, 0.25])],
        );
        let fp = compute(&s, Some(167), &SymmetryConfig::default());
        assert_eq!(fp.to_string(), "Fe2O3#167");
        assert_eq!(fp.space_group(), Some(167));
    }

    #[test]
    fn lattice_signature_sorts_and_rounds_parameters() {
        let s = build([5.04, 3.96, 4.01], [90.2, 119.6, 90.0], &[(2, [0.0, 0.0, 0.0]), (1, [0.5, 0.5, 0.5])]);
        let fp = compute(&s, None, &SymmetryConfig::default());
        assert_eq!(fp.to_string(), "NiO#L4.0-4.0-5.0/90-90-120");
        assert_eq!(fp.space_group(), None);
    }

    #[test]
    fn lattice_and_space_group_keys_never_collide() {
        let s = build([4.0, 4.0, 4.0], [90.0, 90.0, 90.0], &[(2, [0.0, 0.0, 0.0])]);
        let with_sg = compute(&s, Some(221), &SymmetryConfig::default());
        let without = compute(&s, None, &SymmetryConfig::default());
        assert_ne!(with_sg, without);
    }

    fn structure_strategy() -> impl Strategy<Value = ([f64; 3], [f64; 3], Vec<(usize, [f64; 3])>)> {
        (
            [3.0..10.0f64, 3.0..10.0f64, 3.0..10.0f64],
            [80.0..100.0f64, 80.0..100.0f64, 80.0..100.0f64],
            prop::collection::vec(
                (0..SPECIES.len(), [0.0..1.0f64, 0.0..1.0f64, 0.0..1.0f64]),
                1..12,
            ),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn fingerprint_is_invariant_under_permutation_and_translation(
            (lengths, angles, sites, permuted, shift) in structure_strategy().prop_flat_map(|(l, a, s)| {
                (
                    Just(l),
                    Just(a),
                    Just(s.clone()),
                    Just(s).prop_shuffle(),
                    [-2.0..2.0f64, -2.0..2.0f64, -2.0..2.0f64],
                )
            }),
            space_group in prop::option::of(1u16..=230),
        ) {
            let config = SymmetryConfig::default();
            let original = build(lengths, angles, &sites);

            let moved: Vec<(usize, [f64; 3])> = permuted
                .iter()
                .map(|(s, f)| (*s, [f[0] + shift[0], f[1] + shift[1], f[2] + shift[2]]))
                .collect();
            let transformed = build(lengths, angles, &moved);

            prop_assert_eq!(
                compute(&original, space_group, &config),
                compute(&transformed, space_group, &config)
            );
        }
    }
}
