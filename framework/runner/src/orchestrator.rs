use std::sync::Arc;

use volley_core::prelude::{default_run_label, is_valid_run_label, RunCompletion};
use volley_recorder::{record_exists, RunRecord};
use volley_summary_model::{
    append_run_summary, run_summary_path, AssertionEvaluator, ReportGenerator, RunSummary,
};

use crate::config::RunConfig;
use crate::definition::SimulationDefinition;
use crate::engine::{CompletedRun, ScenarioEngine};
use crate::outcome::RunOutcome;
use crate::prompt::{Prompt, PromptKind};
use crate::registry::SimulationSource;

/// The steps an orchestration moves through, in order. Steps that don't apply are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovering,
    Selecting,
    ReportsOnly,
    Configuring,
    Running,
    Reporting,
    Asserting,
    Terminated,
}

/// The services an orchestrator delegates to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub source: &'a dyn SimulationSource,
    pub engine: &'a dyn ScenarioEngine,
    pub reports: &'a dyn ReportGenerator,
    pub assertions: &'a dyn AssertionEvaluator,
}

/// Drives one invocation of the runner from arguments to exit code.
///
/// Every prompt is asked before the simulation starts. Once running, the only inputs are the
/// simulated users and the shutdown signal.
pub struct Orchestrator<'a> {
    config: &'a RunConfig,
    collaborators: Collaborators<'a>,
    prompt: &'a mut dyn Prompt,
    simulation: Option<Arc<SimulationDefinition>>,
    stages: Vec<Stage>,
}

/// Something went wrong reading the user's answers.
struct PromptFailed(std::io::Error);

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a RunConfig,
        collaborators: Collaborators<'a>,
        prompt: &'a mut dyn Prompt,
    ) -> Self {
        Self {
            config,
            collaborators,
            prompt,
            simulation: None,
            stages: Vec::new(),
        }
    }

    /// Run `simulation` without looking at the simulation source.
    pub fn with_simulation(mut self, simulation: Arc<SimulationDefinition>) -> Self {
        self.simulation = Some(simulation);
        self
    }

    /// The stages visited so far.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn run(&mut self) -> RunOutcome {
        let outcome = self.drive();
        self.enter(Stage::Terminated);
        log::info!("Finished with outcome: {outcome}");
        outcome
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("Entering stage {stage:?}");
        self.stages.push(stage);
    }

    fn drive(&mut self) -> RunOutcome {
        if let Err(e) = self.config.validate() {
            eprintln!("Invalid arguments: {e}");
            return RunOutcome::InvalidArguments;
        }

        let run_id = match self.config.reports_only.clone() {
            Some(run_id) => {
                self.enter(Stage::ReportsOnly);
                if let Err(outcome) = self.check_recorded_run(&run_id) {
                    return outcome;
                }
                run_id
            }
            None => match self.run_simulation() {
                Ok(run_id) => run_id,
                Err(outcome) => return outcome,
            },
        };

        if self.config.generate_reports {
            self.enter(Stage::Reporting);
            match self.collaborators.reports.generate(&run_id) {
                Ok(path) => println!(
                    "Reports generated, please open the following file: {}",
                    path.display()
                ),
                Err(e) => eprintln!("Failed to generate reports for run {run_id}: {e:?}"),
            }
        }

        self.check_assertions(&run_id)
    }

    /// Select, configure and run a simulation, returning the id of the committed run.
    fn run_simulation(&mut self) -> Result<String, RunOutcome> {
        let simulation = match self.simulation.clone() {
            Some(simulation) => simulation,
            None => {
                self.enter(Stage::Discovering);
                let candidates = match self.collaborators.source.discover() {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        eprintln!("Failed to discover simulations: {e:?}");
                        return Err(RunOutcome::NoSimulationAvailable);
                    }
                };

                self.enter(Stage::Selecting);
                match self.select(&candidates) {
                    Ok(Some(simulation)) => simulation,
                    Ok(None) => {
                        eprintln!("There is no simulation to run");
                        return Err(RunOutcome::NoSimulationAvailable);
                    }
                    Err(PromptFailed(e)) => {
                        eprintln!("Failed to read the simulation choice: {e}");
                        return Err(RunOutcome::InvalidArguments);
                    }
                }
            }
        };

        self.enter(Stage::Configuring);
        let (label, description) = match self.configure(&simulation) {
            Ok(configured) => configured,
            Err(PromptFailed(e)) => {
                eprintln!("Failed to read the run configuration: {e}");
                return Err(RunOutcome::InvalidArguments);
            }
        };

        self.enter(Stage::Running);
        let completed = match self
            .collaborators
            .engine
            .run(&simulation, &label, &description)
        {
            Ok(completed) => completed,
            Err(e) => {
                eprintln!("Simulation {} failed: {e:?}", simulation.name());
                return Err(RunOutcome::RunFailed);
            }
        };

        self.append_summary(&completed);

        if completed.completion == RunCompletion::Interrupted {
            eprintln!(
                "Run {} was interrupted, skipping reports and assertions",
                completed.run_id()
            );
            return Err(RunOutcome::RunFailed);
        }

        println!("Simulation {} completed as run {}", simulation.name(), completed.run_id());
        Ok(completed.run_id())
    }

    /// Only a complete, readable record is worth reporting on.
    fn check_recorded_run(&self, run_id: &str) -> Result<(), RunOutcome> {
        let results_dir = self.config.results_dir();
        if !record_exists(results_dir, run_id) {
            eprintln!(
                "No record found for run {run_id} in {}",
                results_dir.display()
            );
            return Err(RunOutcome::InvalidArguments);
        }

        match RunRecord::load(results_dir, run_id) {
            Ok(record) if record.is_complete() => Ok(()),
            Ok(_) => {
                eprintln!("Run {run_id} was interrupted, skipping reports and assertions");
                Err(RunOutcome::RunFailed)
            }
            Err(e) => {
                eprintln!("The record of run {run_id} can't be analysed: {e}");
                Err(RunOutcome::RunFailed)
            }
        }
    }

    fn select(
        &mut self,
        candidates: &[Arc<SimulationDefinition>],
    ) -> Result<Option<Arc<SimulationDefinition>>, PromptFailed> {
        if let Some(name) = &self.config.simulation {
            if let Some(found) = candidates.iter().find(|c| c.name() == name) {
                return Ok(Some(found.clone()));
            }
            println!(
                "Simulation {name} not found among the {} available simulations",
                candidates.len()
            );
        }

        match candidates {
            [] => Ok(None),
            [only] => {
                println!("{} is the only simulation, running it", only.name());
                Ok(Some(only.clone()))
            }
            _ => {
                let kind = PromptKind::SimulationChoice {
                    candidates: candidates.iter().map(|c| c.name().to_string()).collect(),
                };
                loop {
                    let answer = self.prompt.prompt_for(&kind).map_err(PromptFailed)?;
                    match answer.trim().parse::<usize>() {
                        Ok(index) if index < candidates.len() => {
                            return Ok(Some(candidates[index].clone()))
                        }
                        _ => self.prompt.notify(&format!(
                            "Invalid selection '{}', enter a number between 0 and {}",
                            answer.trim(),
                            candidates.len() - 1
                        )),
                    }
                }
            }
        }
    }

    fn configure(
        &mut self,
        simulation: &SimulationDefinition,
    ) -> Result<(String, String), PromptFailed> {
        let default_label = default_run_label(simulation.name());

        if self.config.mute {
            return Ok((
                default_label,
                self.config.run_description.clone().unwrap_or_default(),
            ));
        }

        let kind = PromptKind::RunLabel {
            default: default_label.clone(),
        };
        let label = loop {
            let answer = self.prompt.prompt_for(&kind).map_err(PromptFailed)?;
            let answer = answer.trim();
            if answer.is_empty() {
                break default_label;
            }
            if is_valid_run_label(answer) {
                break answer.to_string();
            }
            self.prompt.notify(&format!(
                "Invalid run label '{answer}', only a-z, A-Z, 0-9, - and _ are allowed"
            ));
        };

        let description = match &self.config.run_description {
            Some(description) => description.clone(),
            None => self
                .prompt
                .prompt_for(&PromptKind::RunDescription)
                .map_err(PromptFailed)?
                .trim()
                .to_string(),
        };

        Ok((label, description))
    }

    fn append_summary(&self, completed: &CompletedRun) {
        let summary = RunSummary::new(
            &completed.run,
            &completed.scenarios,
            completed.completion,
            completed.events_written,
            env!("CARGO_PKG_VERSION").to_string(),
        );
        let path = run_summary_path(self.config.results_dir());
        if let Err(e) = append_run_summary(&summary, &path) {
            log::warn!("Failed to append to the run summary {}: {e:?}", path.display());
        }
    }

    fn check_assertions(&mut self, run_id: &str) -> RunOutcome {
        match self.collaborators.assertions.has_assertions(run_id) {
            Ok(false) => RunOutcome::Success,
            Ok(true) => {
                self.enter(Stage::Asserting);
                match self.collaborators.assertions.evaluate(run_id) {
                    Ok(true) => RunOutcome::Success,
                    Ok(false) => {
                        eprintln!("Run {run_id} failed its assertions");
                        RunOutcome::AssertionsFailed
                    }
                    Err(e) => {
                        eprintln!("Failed to evaluate the assertions of run {run_id}: {e:?}");
                        RunOutcome::AssertionsFailed
                    }
                }
            }
            Err(e) => {
                eprintln!("Failed to read the assertions of run {run_id}: {e:?}");
                RunOutcome::AssertionsFailed
            }
        }
    }
}
