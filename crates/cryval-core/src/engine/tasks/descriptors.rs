use crate::core::elements;
use crate::core::models::structure::Structure;
use crate::engine::config::DescriptorConfig;
use crate::engine::verdict::{Rejection, SuspicionFlag};

/// Converts amu/Å³ to g/cm³.
const AMU_PER_CUBIC_ANGSTROM_TO_G_PER_CM3: f64 = 1.660_539_066_60;

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptors {
    pub n_atoms: usize,
    /// g/cm³, from occupancy-weighted standard atomic masses.
    pub density: f64,
    /// Å³ per site.
    pub volume_per_atom: f64,
    pub is_magnetic: bool,
    pub flags: Vec<SuspicionFlag>,
}

/// Computes the physical descriptors of a structure.
///
/// Descriptors only flag, never reject, unless they cannot be computed at all.
pub fn run(structure: &Structure, config: &DescriptorConfig) -> Result<Descriptors, Rejection> {
    let mut mass = 0.0;
    let mut is_magnetic = false;
    for site in structure.sites() {
        let atomic_mass =
            elements::atomic_mass(&site.species).ok_or_else(|| Rejection::Descriptor {
                message: format!("no standard atomic mass for species '{}'", site.species),
            })?;
        mass += atomic_mass * site.occupancy;
        is_magnetic |= config.is_magnetic(&site.species);
    }

    let volume = structure.volume();
    let n_atoms = structure.num_sites();
    let density = mass / volume * AMU_PER_CUBIC_ANGSTROM_TO_G_PER_CM3;
    let volume_per_atom = volume / n_atoms as f64;
    if !density.is_finite() || !volume_per_atom.is_finite() {
        return Err(Rejection::Descriptor {
            message: format!(
                "non-finite descriptors (density {density}, volume per atom {volume_per_atom})"
            ),
        });
    }

    let mut flags = Vec::new();
    if !(config.volume_per_atom_min..=config.volume_per_atom_max).contains(&volume_per_atom) {
        flags.push(SuspicionFlag::NonStandardVolumePerAtom);
    }
    if !(config.density_min..=config.density_max).contains(&density) {
        flags.push(SuspicionFlag::UnrealisticDensity);
    }

    Ok(Descriptors {
        n_atoms,
        density,
        volume_per_atom,
        is_magnetic,
        flags,
    })
}
