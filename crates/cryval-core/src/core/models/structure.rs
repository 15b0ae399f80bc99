use super::composition::Composition;
use super::lattice::Lattice;
use super::site::Site;
use nalgebra::Vector3;
use thiserror::Error;

/// Cell description as read from an input file, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLattice {
    /// Lengths in Angstroms and angles (alpha, beta, gamma) in degrees.
    Parameters { lengths: [f64; 3], angles: [f64; 3] },
    /// Row vectors a, b, c in Angstroms.
    Vectors([[f64; 3]; 3]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSite {
    pub species: String,
    pub frac: [f64; 3],
    pub occupancy: Option<f64>,
}

/// Raw output of a structure parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStructure {
    pub lattice: ParsedLattice,
    pub sites: Vec<ParsedSite>,
    pub declared_space_group: Option<u16>,
}

#[derive(Debug, Error, PartialEq)]
pub enum MalformedStructure {
    #[error("Structure contains no sites")]
    NoSites,
    #[error("Lattice contains non-finite components")]
    NonFiniteLattice,
    #[error("Cell volume must be positive and finite, got {0}")]
    InvalidVolume(f64),
    #[error("Site {index} has non-finite fractional coordinates")]
    NonFiniteCoordinate { index: usize },
    #[error("Site {index} has occupancy {occupancy} outside (0, 1]")]
    InvalidOccupancy { index: usize, occupancy: f64 },
    #[error("Site {index} has an empty species label")]
    EmptySpecies { index: usize },
}

/// A single crystal candidate that satisfies the basic model invariants:
/// at least one site, a positive finite cell volume, and finite coordinates.
#[derive(Debug, Clone)]
pub struct Structure {
    id: String,
    lattice: Lattice,
    sites: Vec<Site>,
    declared_space_group: Option<u16>,
}

impl Structure {
    pub fn new(
        id: impl Into<String>,
        lattice: Lattice,
        sites: Vec<Site>,
        declared_space_group: Option<u16>,
    ) -> Result<Self, MalformedStructure> {
        if sites.is_empty() {
            return Err(MalformedStructure::NoSites);
        }
        if !lattice.is_finite() {
            return Err(MalformedStructure::NonFiniteLattice);
        }
        let volume = lattice.volume();
        if !volume.is_finite() || volume <= 0.0 {
            return Err(MalformedStructure::InvalidVolume(volume));
        }
        for (index, site) in sites.iter().enumerate() {
            if site.species.is_empty() {
                return Err(MalformedStructure::EmptySpecies { index });
            }
            if !site.is_finite() {
                return Err(MalformedStructure::NonFiniteCoordinate { index });
            }
            if !(site.occupancy > 0.0 && site.occupancy <= 1.0) {
                return Err(MalformedStructure::InvalidOccupancy {
                    index,
                    occupancy: site.occupancy,
                });
            }
        }

        Ok(Self {
            id: id.into(),
            lattice,
            sites,
            declared_space_group,
        })
    }

    pub fn from_parsed(
        id: impl Into<String>,
        parsed: ParsedStructure,
    ) -> Result<Self, MalformedStructure> {
        let lattice = match parsed.lattice {
            ParsedLattice::Parameters { lengths, angles } => {
                Lattice::from_parameters(lengths, angles)
            }
            ParsedLattice::Vectors([a, b, c]) => {
                Lattice::from_vectors(Vector3::from(a), Vector3::from(b), Vector3::from(c))
            }
        };
        let sites = parsed
            .sites
            .into_iter()
            .map(|s| Site::new(s.species, Vector3::from(s.frac), s.occupancy.unwrap_or(1.0)))
            .collect();
        Self::new(id, lattice, sites, parsed.declared_space_group)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn declared_space_group(&self) -> Option<u16> {
        self.declared_space_group
    }

    pub fn volume(&self) -> f64 {
        self.lattice.volume()
    }

    pub fn cartesian_coords(&self) -> Vec<Vector3<f64>> {
        self.sites
            .iter()
            .map(|s| self.lattice.to_cartesian(&s.frac))
            .collect()
    }

    pub fn composition(&self) -> Composition {
        self.sites
            .iter()
            .map(|s| (s.species.as_str(), s.occupancy))
            .collect()
    }

    pub fn reduced_formula(&self) -> String {
        self.composition().reduced_formula()
    }
}
