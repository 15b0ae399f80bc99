use crate::cli::ValidateArgs;
use crate::config::PartialValidationConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use cryval::{
    core::io::cif::CifParser,
    engine::{progress::ProgressReporter, report::Report},
    workflows::{self, validate::ValidationRequest},
};
use tracing::{debug, info, warn};

pub fn run(args: ValidateArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialValidationConfig::from_file(path)?,
        None => {
            info!("No configuration file given, using built-in thresholds.");
            PartialValidationConfig::default()
        }
    };
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_with_cli(&args)?;

    let request = ValidationRequest {
        input_dir: args.input.clone(),
        output_dir: args.output.clone(),
        reference_path: args.reference.clone(),
        model_name: args.model_name.clone(),
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Validating structures in {}...", args.input.display());
    info!("Invoking the core validation workflow...");

    let outcome = workflows::validate::run(&request, &CifParser::new(), &final_config, &reporter)?;
    debug!(tally = ?progress_handler.rejections(), "Rejections reported during the run");

    if outcome.report.n_validated == 0 {
        warn!("Validation finished but no structure was accepted.");
        println!("Warning: no structure passed validation.");
    }

    print_summary(&outcome.report);
    println!("Report written to: {}", outcome.report_path.display());
    println!("Per-structure records written to: {}", outcome.records_path.display());

    Ok(())
}

fn print_summary(report: &Report) {
    println!(
        "✓ {}: {}/{} validated (validity {:.3}, duplicates {:.3}, magnetic {:.3})",
        report.model_name,
        report.n_validated,
        report.n_total,
        report.validity_ratio,
        report.duplicate_ratio,
        report.magnetic_ratio,
    );
    if report.novelty_checked {
        println!(
            "  Novelty: {} novel ({:.3})",
            report.n_novel, report.novelty_ratio
        );
    }
    for (reason, count) in &report.rejection_reasons {
        println!("  {:<24} {}", reason.as_str(), count);
    }
}
