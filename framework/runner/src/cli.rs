use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default, Clone)]
#[command(version, about, long_about = None)]
pub struct VolleyCli {
    /// Name of the simulation to run.
    ///
    /// If no simulation with this name is found then the runner falls back to choosing one of the
    /// available simulations, prompting for it when there is more than one.
    #[arg(short, long, env = "VOLLEY_SIMULATION")]
    pub simulation: Option<String>,

    /// Generate the reports, and evaluate the assertions, of an earlier run instead of starting a new
    /// one. The value is the id of that run, as printed when it finished.
    #[arg(short = 'r', long, value_name = "RUN_ID")]
    pub reports_only: Option<String>,

    /// Directory that run records and reports are written to.
    #[arg(long, env = "VOLLEY_RESULTS_FOLDER")]
    pub results_folder: Option<PathBuf>,

    /// A short description of the run, stored in the run record.
    ///
    /// When this is set you won't be prompted for a description.
    #[arg(short = 'd', long)]
    pub run_description: Option<String>,

    /// Do not generate reports once the run has finished.
    #[arg(long, default_value = "false")]
    pub no_reports: bool,

    /// Do not prompt for a run label or description. The run uses the default label derived from the
    /// simulation name.
    ///
    /// Combined with `--simulation` this is recommended for CI/CD environments where nobody is there
    /// to answer.
    #[arg(short, long, default_value = "false")]
    pub mute: bool,

    /// Do not show a progress bar on the CLI.
    #[arg(long, default_value = "false")]
    pub no_progress: bool,

    /// A TOML file to read the run configuration from. Command line arguments take precedence over
    /// values in the file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
