use serde::Serialize;
use std::fmt;

/// Why a structure was rejected. The serialized names are stable and appear in
/// `validation_report.json`, the reason files and the records table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    CifParseError,
    CifSanityError,
    TooManyAtoms,
    Overlap,
    ChargeImbalance,
    Other,
    Duplicate,
}

impl RejectionReason {
    pub const ALL: [RejectionReason; 7] = [
        Self::CifParseError,
        Self::CifSanityError,
        Self::TooManyAtoms,
        Self::Overlap,
        Self::ChargeImbalance,
        Self::Other,
        Self::Duplicate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CifParseError => "cif_parse_error",
            Self::CifSanityError => "cif_sanity_error",
            Self::TooManyAtoms => "too_many_atoms",
            Self::Overlap => "overlap",
            Self::ChargeImbalance => "charge_imbalance",
            Self::Other => "other",
            Self::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejection together with the evidence that caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rejection {
    Parse {
        message: String,
    },
    Sanity {
        message: String,
    },
    TooManyAtoms {
        n_atoms: usize,
        max_atoms: usize,
    },
    Overlap {
        site_a: usize,
        site_b: usize,
        species_a: String,
        species_b: String,
        distance: f64,
        threshold: f64,
    },
    ChargeImbalance {
        policy: &'static str,
        residual: Option<f64>,
    },
    Descriptor {
        message: String,
    },
    Duplicate {
        first_seen: String,
        fingerprint: String,
    },
}

impl Rejection {
    pub fn reason(&self) -> RejectionReason {
        match self {
            Self::Parse { .. } => RejectionReason::CifParseError,
            Self::Sanity { .. } => RejectionReason::CifSanityError,
            Self::TooManyAtoms { .. } => RejectionReason::TooManyAtoms,
            Self::Overlap { .. } => RejectionReason::Overlap,
            Self::ChargeImbalance { .. } => RejectionReason::ChargeImbalance,
            Self::Descriptor { .. } => RejectionReason::Other,
            Self::Duplicate { .. } => RejectionReason::Duplicate,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { message } | Self::Sanity { message } | Self::Descriptor { message } => {
                write!(f, "{}: {}", self.reason(), message)
            }
            Self::TooManyAtoms { n_atoms, max_atoms } => {
                write!(f, "too_many_atoms: {n_atoms} sites exceed the limit of {max_atoms}")
            }
            Self::Overlap {
                site_a,
                site_b,
                species_a,
                species_b,
                distance,
                threshold,
            } => write!(
                f,
                "overlap: {species_a}#{site_a} and {species_b}#{site_b} are {distance:.3} Å apart (minimum {threshold:.3} Å)"
            ),
            Self::ChargeImbalance { policy, residual } => match residual {
                Some(r) => write!(f, "charge_imbalance: residual charge {r:+.3} e ({policy})"),
                None => write!(f, "charge_imbalance: no neutral assignment ({policy})"),
            },
            Self::Duplicate {
                first_seen,
                fingerprint,
            } => write!(f, "duplicate: same fingerprint {fingerprint} as '{first_seen}'"),
        }
    }
}

/// Non-rejecting warning attached to an accepted or rejected structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionFlag {
    LowInteratomicDistance,
    ImageSearchIncomplete,
    NonStandardVolumePerAtom,
    UnrealisticDensity,
}

impl SuspicionFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowInteratomicDistance => "low_interatomic_distance",
            Self::ImageSearchIncomplete => "image_search_incomplete",
            Self::NonStandardVolumePerAtom => "non_standard_volume_per_atom",
            Self::UnrealisticDensity => "unrealistic_density",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Accepted => None,
            Self::Rejected(r) => Some(r),
        }
    }
}

/// Contents of `<name>.reason.json` beside a rejected structure.
#[derive(Debug, Serialize)]
pub struct ReasonFile<'a> {
    pub structure_id: &'a str,
    pub reason: RejectionReason,
    pub details: &'a Rejection,
}

/// One row of `all_structures.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructureRecord {
    pub structure_id: String,
    pub input_path: String,
    pub status: &'static str,
    pub rejection_reason: Option<RejectionReason>,
    pub is_suspicious: bool,
    pub suspicion_flags: String,
    pub is_duplicate: bool,
    pub is_novel: Option<bool>,
    pub is_magnetic: Option<bool>,
    pub n_atoms: Option<usize>,
    pub density: Option<f64>,
    pub volume_per_atom: Option<f64>,
    pub min_distance: Option<f64>,
    pub reduced_formula: Option<String>,
    pub spacegroup: Option<u16>,
    pub fingerprint: Option<String>,
    pub charge_check: Option<&'static str>,
    pub charge_solution: Option<String>,
    pub details: Option<String>,
}
