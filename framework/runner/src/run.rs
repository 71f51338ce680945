use std::process::ExitCode;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::Parser;
use volley_summariser::{RecordAssertionEvaluator, SummaryReportGenerator};

use crate::cli::VolleyCli;
use crate::config::RunConfig;
use crate::definition::SimulationDefinition;
use crate::engine::ThreadedScenarioEngine;
use crate::orchestrator::{Collaborators, Orchestrator};
use crate::outcome::RunOutcome;
use crate::prompt::TerminalPrompt;
use crate::registry::{SimulationRegistry, SimulationSource};

/// Parse the command line and run one of the simulations offered by `source`.
///
/// This is the `main` of a simulation binary:
///
/// ```no_run
/// use volley_runner::prelude::*;
///
/// fn browse(ctx: &mut UserContext) -> HookResult {
///     ctx.request("home", |_| Ok(()))?;
///     Ok(())
/// }
///
/// fn main() -> VolleyResult<std::process::ExitCode> {
///     let simulation = SimulationDefinitionBuilder::new("shop")
///         .use_scenario("Users", 10, browse)
///         .build()?;
///
///     Ok(run_cli(SimulationRegistry::new().register(simulation)))
/// }
/// ```
pub fn run_cli(source: impl SimulationSource) -> ExitCode {
    run_from_args(&source, None)
}

/// Parse the command line and run `simulation`, without offering a choice.
pub fn run_simulation(simulation: SimulationDefinition) -> ExitCode {
    run_from_args(&SimulationRegistry::new(), Some(Arc::new(simulation)))
}

fn run_from_args(
    source: &dyn SimulationSource,
    simulation: Option<Arc<SimulationDefinition>>,
) -> ExitCode {
    // A second init only happens when embedding, the first logger wins.
    let _ = env_logger::try_init();

    let cli = match VolleyCli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => RunOutcome::InvalidArguments.into(),
            };
        }
    };

    run_with_cli(source, simulation, &cli).into()
}

/// Run with an already parsed command line, using the terminal for prompts.
pub fn run_with_cli(
    source: &dyn SimulationSource,
    simulation: Option<Arc<SimulationDefinition>>,
    cli: &VolleyCli,
) -> RunOutcome {
    let config = match RunConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid arguments: {e}");
            return RunOutcome::InvalidArguments;
        }
    };

    let engine = match ThreadedScenarioEngine::new(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to start the scenario engine: {e:?}");
            return RunOutcome::RunFailed;
        }
    };
    engine.listen_for_ctrl_c();

    let reports = SummaryReportGenerator::new(config.results_dir());
    let assertions = RecordAssertionEvaluator::new(config.results_dir());
    let mut prompt = TerminalPrompt::stdio();

    let mut orchestrator = Orchestrator::new(
        &config,
        Collaborators {
            source,
            engine: &engine,
            reports: &reports,
            assertions: &assertions,
        },
        &mut prompt,
    );
    if let Some(simulation) = simulation {
        orchestrator = orchestrator.with_simulation(simulation);
    }

    orchestrator.run()
}
