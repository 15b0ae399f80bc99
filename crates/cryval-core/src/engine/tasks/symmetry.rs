use crate::core::models::structure::Structure;
use crate::engine::config::{SymmetryConfig, SymmetryPolicy};
use moyo::MoyoDataset;
use moyo::base::{AngleTolerance, Cell, Lattice};
use moyo::data::Setting;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SymmetryError {
    #[error("Symmetry search failed: {0}")]
    Search(String),
    #[error("Symmetry search returned invalid space group number {0}")]
    InvalidNumber(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceGroupSource {
    Detected,
    Declared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceGroupAssignment {
    pub number: u16,
    pub source: SpaceGroupSource,
}

/// Finds the space group (1-230) of a structure with a symmetry search at tolerance
/// `symprec` (Angstroms). Species are distinguished by symbol only.
pub fn detect(structure: &Structure, symprec: f64) -> Result<u16, SymmetryError> {
    let mut species_ids: HashMap<&str, i32> = HashMap::new();
    let mut numbers = Vec::with_capacity(structure.num_sites());
    let mut positions = Vec::with_capacity(structure.num_sites());
    for site in structure.sites() {
        let next_id = species_ids.len() as i32 + 1;
        numbers.push(*species_ids.entry(site.species.as_str()).or_insert(next_id));
        positions.push(site.frac);
    }

    let cell = Cell::new(Lattice::new(*structure.lattice().matrix()), positions, numbers);
    let dataset = MoyoDataset::new(&cell, symprec, AngleTolerance::Default, Setting::Spglib, true)
        .map_err(|e| SymmetryError::Search(format!("{e:?}")))?;

    u16::try_from(dataset.number)
        .ok()
        .filter(|n| (1..=230).contains(n))
        .ok_or(SymmetryError::InvalidNumber(dataset.number))
}

/// Picks the space group used for fingerprinting according to the configured policy.
pub fn assign(structure: &Structure, config: &SymmetryConfig) -> Option<SpaceGroupAssignment> {
    let declared = structure
        .declared_space_group()
        .map(|number| SpaceGroupAssignment {
            number,
            source: SpaceGroupSource::Declared,
        });

    match config.policy {
        SymmetryPolicy::None => None,
        SymmetryPolicy::Declared => declared,
        SymmetryPolicy::Detect => match detect(structure, config.symprec) {
            Ok(number) => Some(SpaceGroupAssignment {
                number,
                source: SpaceGroupSource::Detected,
            }),
            Err(e) => {
                debug!(id = structure.id(), error = %e, "Falling back to declared space group");
                declared
            }
        },
    }
}
