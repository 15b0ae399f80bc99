use crate::cli::{ReferenceArgs, ReferenceCommands};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use cryval::{
    core::io::cif::CifParser,
    engine::{config::ValidationConfigBuilder, progress::ProgressReporter},
    workflows,
};
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: ReferenceArgs) -> Result<()> {
    match args.command {
        ReferenceCommands::Build {
            input,
            output,
            symmetry_policy,
            symprec,
        } => build_reference(&input, &output, &symmetry_policy, symprec),
    }
}

fn build_reference(input: &Path, output: &Path, policy: &str, symprec: f64) -> Result<()> {
    let symmetry = ValidationConfigBuilder::new()
        .symmetry_policy(policy.parse()?)
        .symprec(symprec)
        .build()?
        .symmetry;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Building reference table from {}...", input.display());
    info!(policy = %policy, symprec, "Invoking the reference workflow...");

    let built =
        workflows::reference::build(input, output, &CifParser::new(), &symmetry, &reporter)?;

    for (id, reason) in &built.skipped {
        warn!(%id, %reason, "Skipped reference structure");
    }
    println!(
        "✓ {} reference entries written to: {} ({} skipped)",
        built.records.len(),
        built.output_path.display(),
        built.skipped.len()
    );

    Ok(())
}
