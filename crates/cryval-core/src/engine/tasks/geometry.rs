use crate::core::models::lattice::Lattice;
use crate::core::models::structure::Structure;
use crate::engine::config::GeometryThresholds;
use crate::engine::verdict::{Rejection, SuspicionFlag};
use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use std::collections::HashSet;
use tracing::trace;

// The 27-image search is exact for distances up to this multiple of the
// smallest interplanar spacing.
const IMAGE_SEARCH_REACH: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryReport {
    /// Shortest interatomic distance in the periodic structure, including a site's
    /// distance to its own images.
    pub min_distance: f64,
    pub flags: Vec<SuspicionFlag>,
}

/// Cartesian translations for the 26 neighbouring cells plus the home cell.
struct ImageShifts {
    shifts: Vec<Vector3<f64>>,
    matrix_t: Matrix3<f64>,
}

impl ImageShifts {
    fn new(lattice: &Lattice) -> Self {
        let matrix_t = lattice.matrix().transpose();
        let shifts = itertools::iproduct!(-1..=1, -1..=1, -1..=1)
            .map(|(i, j, k)| matrix_t * Vector3::new(i as f64, j as f64, k as f64))
            .collect();
        Self { shifts, matrix_t }
    }

    /// Minimum-image distance between two fractional positions.
    fn distance(&self, a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
        let wrapped = (b - a).map(|d| d - (d + 0.5).floor());
        let base = self.matrix_t * wrapped;
        self.shifts
            .iter()
            .map(|s| (base + s).norm())
            .fold(f64::INFINITY, f64::min)
    }

    /// Length of the shortest non-zero lattice translation among the 26 neighbours.
    fn self_image_distance(&self) -> f64 {
        self.shifts
            .iter()
            .map(|s| s.norm())
            .filter(|&d| d > 0.0)
            .fold(f64::INFINITY, f64::min)
    }
}

/// Checks that no two sites (or a site and its own periodic image) are closer than the
/// configured minimum distance for their species pair.
///
/// # Errors
///
/// Returns [`Rejection::TooManyAtoms`] when the cell exceeds `max_atoms`, and
/// [`Rejection::Overlap`] for the first offending pair in site order.
pub fn run(structure: &Structure, thresholds: &GeometryThresholds) -> Result<GeometryReport, Rejection> {
    let sites = structure.sites();
    if sites.len() > thresholds.max_atoms {
        return Err(Rejection::TooManyAtoms {
            n_atoms: sites.len(),
            max_atoms: thresholds.max_atoms,
        });
    }

    let images = ImageShifts::new(structure.lattice());

    let self_distance = images.self_image_distance();
    let mut min_distance = self_distance;
    let mut checked_species = HashSet::new();
    for (index, site) in sites.iter().enumerate() {
        if !checked_species.insert(site.species.as_str()) {
            continue;
        }
        let threshold = thresholds.threshold(&site.species, &site.species);
        if self_distance < threshold {
            return Err(Rejection::Overlap {
                site_a: index,
                site_b: index,
                species_a: site.species.clone(),
                species_b: site.species.clone(),
                distance: self_distance,
                threshold,
            });
        }
    }

    for ((i, a), (j, b)) in sites.iter().enumerate().tuple_combinations() {
        let distance = images.distance(&a.frac, &b.frac);
        let threshold = thresholds.threshold(&a.species, &b.species);
        if distance < threshold {
            trace!(i, j, distance, threshold, "Overlapping pair");
            return Err(Rejection::Overlap {
                site_a: i,
                site_b: j,
                species_a: a.species.clone(),
                species_b: b.species.clone(),
                distance,
                threshold,
            });
        }
        min_distance = min_distance.min(distance);
    }

    let mut flags = Vec::new();
    if min_distance < thresholds.suspicious_distance {
        flags.push(SuspicionFlag::LowInteratomicDistance);
    }
    let smallest_spacing = structure
        .lattice()
        .interplanar_spacings()
        .into_iter()
        .fold(f64::INFINITY, f64::min);
    if thresholds.max_threshold() > IMAGE_SEARCH_REACH * smallest_spacing {
        flags.push(SuspicionFlag::ImageSearchIncomplete);
    }

    Ok(GeometryReport {
        min_distance,
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::site::Site;
    use crate::engine::config::ElementPair;

    fn cubic(a: f64, sites: &[(&str, [f64; 3])]) -> Structure {
        let lattice = Lattice::from_parameters([a, a, a], [90.0, 90.0, 90.0]);
        let sites = sites
            .iter()
            .map(|(s, f)| Site::new(*s, Vector3::from(*f), 1.0))
            .collect();
        Structure::new("test", lattice, sites, None).unwrap()
    }

    fn rock_salt() -> Structure {
        cubic(
            5.64,
            &[
                ("Na", [0.0, 0.0, 0.0]),
                ("Na", [0.5, 0.5, 0.0]),
                ("Na", [0.5, 0.0, 0.5]),
                ("Na", [0.0, 0.5, 0.5]),
                ("Cl", [0.5, 0.0, 0.0]),
                ("Cl", [0.0, 0.5, 0.0]),
                ("Cl", [0.0, 0.0, 0.5]),
                ("Cl", [0.5, 0.5, 0.5]),
            ],
        )
    }

    #[test]
    fn rock_salt_passes_with_nearest_neighbour_distance() {
        let report = run(&rock_salt(), &GeometryThresholds::default()).unwrap();
        assert!((report.min_distance - 2.82).abs() < 1e-9);
        assert!(report.flags.is_empty());
    }

    #[test]
    fn identical_coordinates_always_overlap() {
        let s = cubic(5.0, &[("Na", [0.1, 0.2, 0.3]), ("Cl", [0.1, 0.2, 0.3])]);
        match run(&s, &GeometryThresholds::default()) {
            Err(Rejection::Overlap {
                site_a,
                site_b,
                distance,
                ..
            }) => {
                assert_eq!((site_a, site_b), (0, 1));
                assert_eq!(distance, 0.0);
            }
            other => panic!("expected overlap, got {other:?}"),
        }
    }

    #[test]
    fn minimum_image_crosses_cell_boundary() {
        let s = cubic(10.0, &[("H", [0.01, 0.5, 0.5]), ("H", [0.99, 0.5, 0.5])]);
        match run(&s, &GeometryThresholds::default()) {
            Err(Rejection::Overlap { distance, .. }) => assert!((distance - 0.2).abs() < 1e-9),
            other => panic!("expected overlap, got {other:?}"),
        }
    }

    #[test]
    fn single_atom_cell_is_checked_against_its_own_images() {
        let roomy = cubic(3.0, &[("Cu", [0.0, 0.0, 0.0])]);
        let report = run(&roomy, &GeometryThresholds::default()).unwrap();
        assert!((report.min_distance - 3.0).abs() < 1e-9);

        let cramped = cubic(0.5, &[("Cu", [0.0, 0.0, 0.0])]);
        assert!(matches!(
            run(&cramped, &GeometryThresholds::default()),
            Err(Rejection::Overlap { site_a: 0, site_b: 0, .. })
        ));
    }

    #[test]
    fn pair_specific_threshold_overrides_global_minimum() {
        let s = cubic(6.0, &[("Fe", [0.0, 0.0, 0.0]), ("O", [0.25, 0.0, 0.0])]);
        assert!(run(&s, &GeometryThresholds::default()).is_ok());

        let mut strict = GeometryThresholds::default();
        strict
            .pair_min_distances
            .insert(ElementPair::new("O", "Fe"), 1.6);
        assert!(matches!(
            run(&s, &strict),
            Err(Rejection::Overlap { threshold, .. }) if threshold == 1.6
        ));
    }

    #[test]
    fn short_but_allowed_distance_is_flagged_suspicious() {
        let s = cubic(8.0, &[("H", [0.0, 0.0, 0.0]), ("H", [0.125, 0.0, 0.0])]);
        let report = run(&s, &GeometryThresholds::default()).unwrap();
        assert!((report.min_distance - 1.0).abs() < 1e-9);
        assert_eq!(report.flags, vec![SuspicionFlag::LowInteratomicDistance]);
    }

    #[test]
    fn too_many_atoms_is_rejected_before_pair_search() {
        let s = cubic(5.0, &[("Na", [0.0, 0.0, 0.0]), ("Na", [0.0, 0.0, 0.0])]);
        let thresholds = GeometryThresholds {
            max_atoms: 1,
            ..GeometryThresholds::default()
        };
        assert_eq!(
            run(&s, &thresholds),
            Err(Rejection::TooManyAtoms {
                n_atoms: 2,
                max_atoms: 1
            })
        );
    }

    #[test]
    fn threshold_beyond_image_reach_is_flagged() {
        let s = cubic(2.0, &[("H", [0.0, 0.0, 0.0])]);
        let mut thresholds = GeometryThresholds::default();
        thresholds
            .pair_min_distances
            .insert(ElementPair::new("H", "He"), 3.5);
        let report = run(&s, &thresholds).unwrap();
        assert_eq!(report.flags, vec![SuspicionFlag::ImageSearchIncomplete]);
    }
}
