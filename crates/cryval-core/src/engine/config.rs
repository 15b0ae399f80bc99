use crate::core::elements;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Invalid element pair '{0}', expected the form 'A-B' (e.g. 'Fe-O')")]
    InvalidElementPair(String),
    #[error("Unknown element symbol '{0}'")]
    UnknownElement(String),
    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

fn canonical_symbol(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    match elements::normalize_symbol(trimmed) {
        Some(symbol) if symbol.eq_ignore_ascii_case(trimmed) => Ok(symbol),
        _ => Err(ConfigError::UnknownElement(trimmed.to_string())),
    }
}

/// An unordered pair of element symbols, stored alphabetically so that `Fe-O` and `O-Fe`
/// are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementPair(String, String);

impl ElementPair {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }

    pub fn first(&self) -> &str {
        &self.0
    }

    pub fn second(&self) -> &str {
        &self.1
    }
}

impl FromStr for ElementPair {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once('-')
            .ok_or_else(|| ConfigError::InvalidElementPair(s.to_string()))?;
        if a.trim().is_empty() || b.trim().is_empty() {
            return Err(ConfigError::InvalidElementPair(s.to_string()));
        }
        Ok(Self::new(&canonical_symbol(a)?, &canonical_symbol(b)?))
    }
}

impl fmt::Display for ElementPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// How multivalent elements are handled by the charge-neutrality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargePolicy {
    /// Search for one oxidation state per element that balances the cell.
    #[default]
    Search,
    /// Use only the most common oxidation state of every element.
    FirstState,
    /// Let multivalent elements take any charge between their extreme states.
    Wildcard,
}

impl ChargePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::FirstState => "first-state",
            Self::Wildcard => "wildcard",
        }
    }
}

impl FromStr for ChargePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "first-state" | "first_state" => Ok(Self::FirstState),
            "wildcard" => Ok(Self::Wildcard),
            _ => Err(ConfigError::UnknownVariant {
                kind: "charge policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ChargePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the space group used for fingerprinting comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymmetryPolicy {
    /// Run a symmetry search, falling back to the declared number if it fails.
    #[default]
    Detect,
    /// Trust the number declared in the input file.
    Declared,
    /// Never use a space group; fingerprints use the lattice signature.
    None,
}

impl SymmetryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::Declared => "declared",
            Self::None => "none",
        }
    }
}

impl FromStr for SymmetryPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detect" => Ok(Self::Detect),
            "declared" => Ok(Self::Declared),
            "none" => Ok(Self::None),
            _ => Err(ConfigError::UnknownVariant {
                kind: "symmetry policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for SymmetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryThresholds {
    pub min_distance: f64,
    pub suspicious_distance: f64,
    pub max_atoms: usize,
    pub pair_min_distances: HashMap<ElementPair, f64>,
}

impl GeometryThresholds {
    /// Minimum allowed distance between two species, falling back to the global minimum.
    pub fn threshold(&self, a: &str, b: &str) -> f64 {
        self.pair_min_distances
            .get(&ElementPair::new(a, b))
            .copied()
            .unwrap_or(self.min_distance)
    }

    pub fn max_threshold(&self) -> f64 {
        self.pair_min_distances
            .values()
            .copied()
            .fold(self.min_distance.max(self.suspicious_distance), f64::max)
    }
}

impl Default for GeometryThresholds {
    fn default() -> Self {
        Self {
            min_distance: 0.7,
            suspicious_distance: 1.2,
            max_atoms: 500,
            pair_min_distances: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeConfig {
    pub tolerance: f64,
    pub policy: ChargePolicy,
    pub oxidation_overrides: HashMap<String, Vec<i8>>,
}

impl ChargeConfig {
    /// Oxidation states for `symbol`, preferring configured overrides over the static table.
    pub fn states(&self, symbol: &str) -> Option<&[i8]> {
        match self.oxidation_overrides.get(symbol) {
            Some(states) => Some(states.as_slice()),
            None => elements::oxidation_states(symbol),
        }
    }
}

impl Default for ChargeConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            policy: ChargePolicy::default(),
            oxidation_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorConfig {
    pub volume_per_atom_min: f64,
    pub volume_per_atom_max: f64,
    pub density_min: f64,
    pub density_max: f64,
    /// Replaces the built-in magnetic-element set when present.
    pub magnetic_elements: Option<HashSet<String>>,
}

impl DescriptorConfig {
    pub fn is_magnetic(&self, symbol: &str) -> bool {
        match &self.magnetic_elements {
            Some(set) => set.contains(symbol),
            None => elements::is_magnetic_element(symbol),
        }
    }
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            volume_per_atom_min: 8.0,
            volume_per_atom_max: 40.0,
            density_min: 0.5,
            density_max: 30.0,
            magnetic_elements: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryConfig {
    pub policy: SymmetryPolicy,
    pub symprec: f64,
    pub length_decimals: u32,
    pub angle_decimals: u32,
}

impl Default for SymmetryConfig {
    fn default() -> Self {
        Self {
            policy: SymmetryPolicy::default(),
            symprec: 0.01,
            length_decimals: 1,
            angle_decimals: 0,
        }
    }
}

/// Immutable thresholds for one validation run, shared by reference across workers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationConfig {
    pub geometry: GeometryThresholds,
    pub charge: ChargeConfig,
    pub descriptors: DescriptorConfig,
    pub symmetry: SymmetryConfig,
}

#[derive(Default)]
pub struct ValidationConfigBuilder {
    config: ValidationConfig,
}

impl ValidationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_distance(mut self, distance: f64) -> Self {
        self.config.geometry.min_distance = distance;
        self
    }
    pub fn suspicious_distance(mut self, distance: f64) -> Self {
        self.config.geometry.suspicious_distance = distance;
        self
    }
    pub fn max_atoms(mut self, max_atoms: usize) -> Self {
        self.config.geometry.max_atoms = max_atoms;
        self
    }
    pub fn pair_min_distance(mut self, pair: ElementPair, distance: f64) -> Self {
        self.config.geometry.pair_min_distances.insert(pair, distance);
        self
    }
    pub fn charge_tolerance(mut self, tolerance: f64) -> Self {
        self.config.charge.tolerance = tolerance;
        self
    }
    pub fn charge_policy(mut self, policy: ChargePolicy) -> Self {
        self.config.charge.policy = policy;
        self
    }
    pub fn oxidation_states(mut self, symbol: &str, states: Vec<i8>) -> Self {
        self.config
            .charge
            .oxidation_overrides
            .insert(symbol.to_string(), states);
        self
    }
    pub fn volume_per_atom_range(mut self, min: f64, max: f64) -> Self {
        self.config.descriptors.volume_per_atom_min = min;
        self.config.descriptors.volume_per_atom_max = max;
        self
    }
    pub fn density_range(mut self, min: f64, max: f64) -> Self {
        self.config.descriptors.density_min = min;
        self.config.descriptors.density_max = max;
        self
    }
    pub fn magnetic_elements<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.descriptors.magnetic_elements =
            Some(symbols.into_iter().map(Into::into).collect());
        self
    }
    pub fn symmetry_policy(mut self, policy: SymmetryPolicy) -> Self {
        self.config.symmetry.policy = policy;
        self
    }
    pub fn symprec(mut self, symprec: f64) -> Self {
        self.config.symmetry.symprec = symprec;
        self
    }

    pub fn build(self) -> Result<ValidationConfig, ConfigError> {
        let mut config = self.config;

        positive("min-distance", config.geometry.min_distance)?;
        positive("suspicious-distance", config.geometry.suspicious_distance)?;
        if config.geometry.max_atoms == 0 {
            return Err(invalid("max-atoms", "must be at least 1"));
        }
        for (pair, &distance) in &config.geometry.pair_min_distances {
            if !(distance.is_finite() && distance > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "pair-min-distances",
                    reason: format!("{pair} must be a positive distance, got {distance}"),
                });
            }
        }

        if !(config.charge.tolerance.is_finite() && config.charge.tolerance >= 0.0) {
            return Err(invalid("charge-tolerance", "must be non-negative"));
        }
        let mut overrides = HashMap::new();
        for (symbol, states) in config.charge.oxidation_overrides.drain() {
            if states.is_empty() {
                return Err(ConfigError::InvalidParameter {
                    name: "oxidation-states",
                    reason: format!("{symbol} lists no oxidation states"),
                });
            }
            overrides.insert(canonical_symbol(&symbol)?, states);
        }
        config.charge.oxidation_overrides = overrides;

        let d = &config.descriptors;
        if !(d.volume_per_atom_min.is_finite()
            && d.volume_per_atom_max.is_finite()
            && d.volume_per_atom_min < d.volume_per_atom_max)
        {
            return Err(invalid("volume-per-atom", "min must be below max"));
        }
        if !(d.density_min.is_finite() && d.density_max.is_finite() && d.density_min < d.density_max)
        {
            return Err(invalid("density", "min must be below max"));
        }
        if let Some(set) = config.descriptors.magnetic_elements.take() {
            let canonical = set
                .iter()
                .map(|s| canonical_symbol(s))
                .collect::<Result<HashSet<_>, _>>()?;
            config.descriptors.magnetic_elements = Some(canonical);
        }

        positive("symprec", config.symmetry.symprec)?;

        Ok(config)
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, &format!("must be a positive number, got {value}")))
    }
}
