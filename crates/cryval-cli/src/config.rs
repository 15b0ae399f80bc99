use crate::cli::ValidateArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use cryval::engine::config::{self as core_config, ElementPair};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialGeometryConfig {
    min_distance: Option<f64>,
    suspicious_distance: Option<f64>,
    max_atoms: Option<usize>,
    pair_min_distances: Option<BTreeMap<String, f64>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialChargeConfig {
    tolerance: Option<f64>,
    policy: Option<String>,
    oxidation_states: Option<BTreeMap<String, Vec<i8>>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialDescriptorConfig {
    volume_per_atom_min: Option<f64>,
    volume_per_atom_max: Option<f64>,
    density_min: Option<f64>,
    density_max: Option<f64>,
    magnetic_elements: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSymmetryConfig {
    policy: Option<String>,
    symprec: Option<f64>,
}

/// Threshold configuration as written in a TOML file. Every key is optional; missing
/// keys fall back to the engine defaults.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialValidationConfig {
    geometry: Option<PartialGeometryConfig>,
    charge: Option<PartialChargeConfig>,
    descriptors: Option<PartialDescriptorConfig>,
    symmetry: Option<PartialSymmetryConfig>,
}

impl PartialValidationConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolves the final configuration. Precedence, highest first: dedicated CLI flags,
    /// `--set` values, the config file, engine defaults.
    pub fn merge_with_cli(mut self, args: &ValidateArgs) -> Result<core_config::ValidationConfig> {
        self.apply_set_values(&args.set_values)?;

        let geometry = self.geometry.take().unwrap_or_default();
        let charge = self.charge.take().unwrap_or_default();
        let descriptors = self.descriptors.take().unwrap_or_default();
        let symmetry = self.symmetry.take().unwrap_or_default();
        let defaults = core_config::ValidationConfig::default();

        let mut builder = core_config::ValidationConfigBuilder::new()
            .min_distance(
                args.min_distance
                    .or(geometry.min_distance)
                    .unwrap_or(defaults.geometry.min_distance),
            )
            .suspicious_distance(
                geometry
                    .suspicious_distance
                    .unwrap_or(defaults.geometry.suspicious_distance),
            )
            .max_atoms(geometry.max_atoms.unwrap_or(defaults.geometry.max_atoms))
            .charge_tolerance(
                args.charge_tolerance
                    .or(charge.tolerance)
                    .unwrap_or(defaults.charge.tolerance),
            )
            .volume_per_atom_range(
                descriptors
                    .volume_per_atom_min
                    .unwrap_or(defaults.descriptors.volume_per_atom_min),
                descriptors
                    .volume_per_atom_max
                    .unwrap_or(defaults.descriptors.volume_per_atom_max),
            )
            .density_range(
                descriptors
                    .density_min
                    .unwrap_or(defaults.descriptors.density_min),
                descriptors
                    .density_max
                    .unwrap_or(defaults.descriptors.density_max),
            )
            .symprec(symmetry.symprec.unwrap_or(defaults.symmetry.symprec));

        for (pair, distance) in geometry.pair_min_distances.unwrap_or_default() {
            builder = builder.pair_min_distance(pair.parse::<ElementPair>()?, distance);
        }
        for raw in &args.pair_distances {
            let (pair, distance) =
                parser::parse_pair_distance(raw).map_err(|e| CliError::Argument(e.to_string()))?;
            builder = builder.pair_min_distance(pair, distance);
        }

        if let Some(policy) = charge.policy {
            builder = builder.charge_policy(policy.parse()?);
        }
        for (symbol, states) in charge.oxidation_states.unwrap_or_default() {
            builder = builder.oxidation_states(&symbol, states);
        }
        if let Some(symbols) = descriptors.magnetic_elements {
            builder = builder.magnetic_elements(symbols);
        }
        if let Some(policy) = symmetry.policy {
            builder = builder.symmetry_policy(policy.parse()?);
        }

        Ok(builder.build()?)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) =
                parser::split_assignment(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;
            let invalid = |e: parser::ParseError| CliError::Config(e.to_string());

            match key {
                "geometry.min-distance" => {
                    self.geometry_mut().min_distance =
                        Some(parser::parse_value(key, value, "float").map_err(invalid)?);
                }
                "geometry.suspicious-distance" => {
                    self.geometry_mut().suspicious_distance =
                        Some(parser::parse_value(key, value, "float").map_err(invalid)?);
                }
                "geometry.max-atoms" => {
                    self.geometry_mut().max_atoms =
                        Some(parser::parse_value(key, value, "integer").map_err(invalid)?);
                }
                "charge.tolerance" => {
                    self.charge_mut().tolerance =
                        Some(parser::parse_value(key, value, "float").map_err(invalid)?);
                }
                "charge.policy" => {
                    self.charge_mut().policy = Some(value.to_string());
                }
                "descriptors.volume-per-atom-min" => {
                    self.descriptors_mut().volume_per_atom_min =
                        Some(parser::parse_value(key, value, "float").map_err(invalid)?);
                }
                "descriptors.volume-per-atom-max" => {
                    self.descriptors_mut().volume_per_atom_max =
                        Some(parser::parse_value(key, value, "float").map_err(invalid)?);
                }
                "descriptors.density-min" => {
                    self.descriptors_mut().density_min =
                        Some(parser::parse_value(key, value, "float").map_err(invalid)?);
                }
                "descriptors.density-max" => {
                    self.descriptors_mut().density_max =
                        Some(parser::parse_value(key, value, "float").map_err(invalid)?);
                }
                "descriptors.magnetic-elements" => {
                    self.descriptors_mut().magnetic_elements =
                        Some(parser::parse_list(key, value, "element").map_err(invalid)?);
                }
                "symmetry.policy" => {
                    self.symmetry.get_or_insert_with(Default::default).policy =
                        Some(value.to_string());
                }
                "symmetry.symprec" => {
                    self.symmetry.get_or_insert_with(Default::default).symprec =
                        Some(parser::parse_value(key, value, "float").map_err(invalid)?);
                }
                _ => {
                    if let Some(pair) = key.strip_prefix("geometry.pair-min-distances.") {
                        let distance = parser::parse_value(key, value, "float").map_err(invalid)?;
                        self.geometry_mut()
                            .pair_min_distances
                            .get_or_insert_with(Default::default)
                            .insert(pair.to_string(), distance);
                    } else if let Some(symbol) = key.strip_prefix("charge.oxidation-states.") {
                        let states = parser::parse_list(key, value, "integer").map_err(invalid)?;
                        self.charge_mut()
                            .oxidation_states
                            .get_or_insert_with(Default::default)
                            .insert(symbol.to_string(), states);
                    } else {
                        return Err(CliError::Config(format!(
                            "Unsupported configuration key for --set: '{}'",
                            key
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn geometry_mut(&mut self) -> &mut PartialGeometryConfig {
        self.geometry.get_or_insert_with(Default::default)
    }

    fn charge_mut(&mut self) -> &mut PartialChargeConfig {
        self.charge.get_or_insert_with(Default::default)
    }

    fn descriptors_mut(&mut self) -> &mut PartialDescriptorConfig {
        self.descriptors.get_or_insert_with(Default::default)
    }
}
