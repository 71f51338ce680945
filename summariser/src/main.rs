use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use volley_summariser::{RecordAssertionEvaluator, SummaryReportGenerator};
use volley_summary_model::{AssertionEvaluator, ReportGenerator};

/// Generate the report of a recorded run and check its assertions.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct SummariserCli {
    /// The id of the run, as printed when it finished.
    run_id: String,

    /// Directory that the run was recorded in.
    #[arg(long, env = "VOLLEY_RESULTS_FOLDER", default_value = "results")]
    results_folder: PathBuf,

    /// Only print the assertion results.
    #[arg(long, default_value = "false")]
    no_reports: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    let cli = SummariserCli::parse();
    log::debug!("Summarising run {} in {}", cli.run_id, cli.results_folder.display());

    if !cli.no_reports {
        let path = SummaryReportGenerator::new(&cli.results_folder).generate(&cli.run_id)?;
        println!("Report written to {}", path.display());
    }

    let evaluator = RecordAssertionEvaluator::new(&cli.results_folder);
    if evaluator.has_assertions(&cli.run_id)? && !evaluator.evaluate(&cli.run_id)? {
        return Ok(ExitCode::from(2));
    }

    Ok(ExitCode::SUCCESS)
}
