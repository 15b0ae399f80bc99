use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "CRYVAL CLI - Physical-plausibility validation, deduplication and novelty scoring for batches of generated crystal structures.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a directory of generated CIF structures and write the validation report.
    Validate(ValidateArgs),
    /// Manage reference (training set) tables used for novelty scoring.
    Reference(ReferenceArgs),
}

/// Arguments for the `validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    // --- Core Arguments ---
    /// Directory searched recursively for `*.cif` files.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory for routed structures, records and the report.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Threshold configuration file in TOML format. Built-in defaults are used when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Reference CSV (id, reduced_formula, spacegroup) for novelty scoring.
    #[arg(short, long, value_name = "PATH")]
    pub reference: Option<PathBuf>,

    /// Model name recorded in the report. Defaults to the input directory name.
    #[arg(long, value_name = "NAME")]
    pub model_name: Option<String>,

    // --- Threshold Overrides ---
    /// Override the global minimum interatomic distance in Angstroms.
    #[arg(long, value_name = "FLOAT")]
    pub min_distance: Option<f64>,

    /// Override the charge-imbalance tolerance in elementary charges.
    #[arg(long, value_name = "FLOAT")]
    pub charge_tolerance: Option<f64>,

    /// Add or override a pair-specific minimum distance. Can be used multiple times.
    /// Example: --pair-distance Fe-O=1.6
    #[arg(long = "pair-distance", value_name = "A-B=FLOAT")]
    pub pair_distances: Vec<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S charge.policy=wildcard
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `reference` subcommand.
#[derive(Args, Debug)]
pub struct ReferenceArgs {
    #[command(subcommand)]
    pub command: ReferenceCommands,
}

#[derive(Subcommand, Debug)]
pub enum ReferenceCommands {
    /// Build a reference CSV from a directory of known CIF structures.
    Build {
        /// Directory searched recursively for `*.cif` files.
        #[arg(short, long, required = true, value_name = "DIR")]
        input: PathBuf,

        /// Path of the CSV file to write.
        #[arg(short, long, required = true, value_name = "PATH")]
        output: PathBuf,

        /// Space-group source for the `spacegroup` column (detect, declared or none).
        #[arg(long, value_name = "POLICY", default_value = "detect")]
        symmetry_policy: String,

        /// Tolerance of the symmetry search in Angstroms.
        #[arg(long, value_name = "FLOAT", default_value_t = 0.01)]
        symprec: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_arguments_parse_with_repeated_overrides() {
        let cli = Cli::parse_from([
            "cryval",
            "-vv",
            "validate",
            "-i",
            "gen",
            "-o",
            "out",
            "--pair-distance",
            "Fe-O=1.6",
            "--pair-distance",
            "Li-Li=2.0",
            "-S",
            "charge.policy=wildcard",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.input, PathBuf::from("gen"));
        assert_eq!(args.pair_distances, ["Fe-O=1.6", "Li-Li=2.0"]);
        assert_eq!(args.set_values, ["charge.policy=wildcard"]);
        assert!(args.config.is_none());
    }

    #[test]
    fn reference_build_has_defaults() {
        let cli = Cli::parse_from(["cryval", "reference", "build", "-i", "train", "-o", "ref.csv"]);
        let Commands::Reference(ReferenceArgs {
            command:
                ReferenceCommands::Build {
                    symmetry_policy,
                    symprec,
                    ..
                },
        }) = cli.command
        else {
            panic!("expected reference build");
        };
        assert_eq!(symmetry_policy, "detect");
        assert_eq!(symprec, 0.01);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["cryval", "-q", "-v", "validate", "-i", "a", "-o", "b"]);
        assert!(result.is_err());
    }
}
