use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use volley_recorder::{record_path, RecorderConfig, ResultRecorder};
use volley_runner::prelude::{
    Collaborators, CompletedRun, HookResult, Orchestrator, PromptKind, RunCompletion, RunConfig,
    RunDescriptor, RunOutcome, ScenarioEngine, ScriptedPrompt, SimulationDefinition,
    SimulationDefinitionBuilder, SimulationRegistry, SimulationSource, Stage, UserContext,
};
use volley_summary_model::{load_run_summaries, run_summary_path, AssertionEvaluator, ReportGenerator};

fn idle(_: &mut UserContext) -> HookResult {
    Ok(())
}

fn simulation(name: &str) -> SimulationDefinition {
    SimulationDefinitionBuilder::new(name)
        .use_scenario("Users", 10, idle)
        .build()
        .unwrap()
}

/// Remembers what it was asked to run instead of running it.
struct FakeEngine {
    completion: RunCompletion,
    fail: bool,
    runs: Mutex<Vec<(String, String, String)>>,
}

impl FakeEngine {
    fn completing() -> Self {
        Self {
            completion: RunCompletion::Completed,
            fail: false,
            runs: Mutex::new(Vec::new()),
        }
    }

    fn runs(&self) -> Vec<(String, String, String)> {
        self.runs.lock().clone()
    }
}

impl ScenarioEngine for FakeEngine {
    fn run(
        &self,
        simulation: &SimulationDefinition,
        label: &str,
        description: &str,
    ) -> anyhow::Result<CompletedRun> {
        self.runs.lock().push((
            simulation.name().to_string(),
            label.to_string(),
            description.to_string(),
        ));
        if self.fail {
            anyhow::bail!("Failed to write the run record");
        }

        Ok(CompletedRun {
            run: RunDescriptor::new(simulation.name(), label, 1_000, description),
            scenarios: simulation.descriptors(),
            completion: self.completion,
            events_written: 1,
        })
    }
}

#[derive(Default)]
struct FakeReports {
    fail: bool,
    generated: Mutex<Vec<String>>,
}

impl ReportGenerator for FakeReports {
    fn generate(&self, run_id: &str) -> anyhow::Result<PathBuf> {
        self.generated.lock().push(run_id.to_string());
        if self.fail {
            anyhow::bail!("disk full");
        }
        Ok(PathBuf::from(format!("{run_id}/summary.json")))
    }
}

struct FakeAssertions {
    declared: bool,
    passing: anyhow::Result<bool>,
}

impl FakeAssertions {
    fn none() -> Self {
        Self {
            declared: false,
            passing: Ok(true),
        }
    }

    fn declared(passing: anyhow::Result<bool>) -> Self {
        Self {
            declared: true,
            passing,
        }
    }
}

impl AssertionEvaluator for FakeAssertions {
    fn has_assertions(&self, _run_id: &str) -> anyhow::Result<bool> {
        Ok(self.declared)
    }

    fn evaluate(&self, _run_id: &str) -> anyhow::Result<bool> {
        match &self.passing {
            Ok(passed) => Ok(*passed),
            Err(e) => Err(anyhow::anyhow!("{e}")),
        }
    }
}

struct BrokenSource;

impl SimulationSource for BrokenSource {
    fn discover(&self) -> anyhow::Result<Vec<Arc<SimulationDefinition>>> {
        anyhow::bail!("could not scan for simulations")
    }
}

/// Everything one orchestration needs, with a results directory of its own.
struct Harness {
    dir: tempfile::TempDir,
    config: RunConfig,
    source: SimulationRegistry,
    engine: FakeEngine,
    reports: FakeReports,
    assertions: FakeAssertions,
}

impl Harness {
    fn new(source: SimulationRegistry) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            show_progress: false,
            recorder: RecorderConfig::default().with_results_dir(dir.path()),
            ..Default::default()
        };
        Self {
            dir,
            config,
            source,
            engine: FakeEngine::completing(),
            reports: FakeReports::default(),
            assertions: FakeAssertions::none(),
        }
    }

    fn run(&self, prompt: &mut ScriptedPrompt) -> (RunOutcome, Vec<Stage>) {
        self.run_with_source(&self.source, prompt)
    }

    fn run_with_source(
        &self,
        source: &dyn SimulationSource,
        prompt: &mut ScriptedPrompt,
    ) -> (RunOutcome, Vec<Stage>) {
        let mut orchestrator = Orchestrator::new(
            &self.config,
            Collaborators {
                source,
                engine: &self.engine,
                reports: &self.reports,
                assertions: &self.assertions,
            },
            prompt,
        );
        let outcome = orchestrator.run();
        (outcome, orchestrator.stages().to_vec())
    }
}

#[test]
fn no_candidates_means_no_simulation_available() {
    let harness = Harness::new(SimulationRegistry::new());
    let mut prompt = ScriptedPrompt::default();

    let (outcome, stages) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::NoSimulationAvailable, outcome);
    assert_eq!(
        vec![Stage::Discovering, Stage::Selecting, Stage::Terminated],
        stages
    );
    assert!(prompt.asked().is_empty());
    assert!(harness.engine.runs().is_empty());
}

#[test]
fn discovery_failure_means_no_simulation_available() {
    let harness = Harness::new(SimulationRegistry::new());
    let mut prompt = ScriptedPrompt::default();

    let (outcome, _) = harness.run_with_source(&BrokenSource, &mut prompt);

    assert_eq!(RunOutcome::NoSimulationAvailable, outcome);
}

#[test]
fn single_candidate_is_selected_without_prompting() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("only_one")));
    harness.config.mute = true;
    let mut prompt = ScriptedPrompt::default();

    let (outcome, stages) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::Success, outcome);
    assert!(prompt.asked().is_empty());
    assert_eq!(
        vec![(
            "only_one".to_string(),
            "only_one".to_string(),
            String::new()
        )],
        harness.engine.runs()
    );
    assert_eq!(
        vec![
            Stage::Discovering,
            Stage::Selecting,
            Stage::Configuring,
            Stage::Running,
            Stage::Reporting,
            Stage::Terminated
        ],
        stages
    );
    assert_eq!(
        vec!["only_one-1000".to_string()],
        *harness.reports.generated.lock()
    );
}

#[test]
fn out_of_range_and_non_numeric_choices_are_asked_again() {
    let harness = Harness::new(
        SimulationRegistry::new()
            .register(simulation("alpha"))
            .register(simulation("beta")),
    );
    let mut prompt = ScriptedPrompt::new(["5", "two", "1", "", ""]);

    let (outcome, _) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::Success, outcome);
    assert_eq!(0, prompt.remaining());
    assert_eq!(2, prompt.notices().len());
    assert_eq!(
        PromptKind::SimulationChoice {
            candidates: vec!["alpha".to_string(), "beta".to_string()]
        },
        prompt.asked()[0]
    );
    assert_eq!(
        vec![("beta".to_string(), "beta".to_string(), String::new())],
        harness.engine.runs()
    );
}

#[test]
fn configured_simulation_wins_and_unknown_name_falls_through() {
    let source = SimulationRegistry::new()
        .register(simulation("alpha"))
        .register(simulation("beta"));

    let mut harness = Harness::new(source.clone());
    harness.config.simulation = Some("beta".to_string());
    harness.config.mute = true;
    let mut prompt = ScriptedPrompt::default();
    assert_eq!(RunOutcome::Success, harness.run(&mut prompt).0);
    assert!(prompt.asked().is_empty());
    assert_eq!("beta", harness.engine.runs()[0].0);

    let mut harness = Harness::new(source);
    harness.config.simulation = Some("gamma".to_string());
    harness.config.mute = true;
    let mut prompt = ScriptedPrompt::new(["0"]);
    assert_eq!(RunOutcome::Success, harness.run(&mut prompt).0);
    assert_eq!(1, prompt.asked().len());
    assert_eq!("alpha", harness.engine.runs()[0].0);
}

#[test]
fn explicit_simulation_skips_discovery() {
    let harness = Harness::new(SimulationRegistry::new());
    let mut prompt = ScriptedPrompt::new(["", "explicit run"]);

    let mut orchestrator = Orchestrator::new(
        &harness.config,
        Collaborators {
            source: &BrokenSource,
            engine: &harness.engine,
            reports: &harness.reports,
            assertions: &harness.assertions,
        },
        &mut prompt,
    )
    .with_simulation(Arc::new(simulation("explicit")));

    assert_eq!(RunOutcome::Success, orchestrator.run());
    assert!(!orchestrator.stages().contains(&Stage::Discovering));
    assert_eq!(
        vec![(
            "explicit".to_string(),
            "explicit".to_string(),
            "explicit run".to_string()
        )],
        harness.engine.runs()
    );
}

#[test]
fn invalid_label_is_asked_again_and_empty_label_uses_default() {
    let harness = Harness::new(SimulationRegistry::new().register(simulation("my.pkg.Checkout")));
    let mut prompt = ScriptedPrompt::new(["a/b", "bad label", "nightly-1", "first try"]);

    let (outcome, _) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::Success, outcome);
    assert_eq!(
        PromptKind::RunLabel {
            default: "checkout".to_string()
        },
        prompt.asked()[0]
    );
    assert_eq!(2, prompt.notices().len());
    assert_eq!(
        vec![(
            "my.pkg.Checkout".to_string(),
            "nightly-1".to_string(),
            "first try".to_string()
        )],
        harness.engine.runs()
    );

    let harness = Harness::new(SimulationRegistry::new().register(simulation("my.pkg.Checkout")));
    let mut prompt = ScriptedPrompt::new(["", ""]);
    harness.run(&mut prompt);
    assert_eq!("checkout", harness.engine.runs()[0].1);
}

#[test]
fn configured_description_is_not_prompted_for() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.config.run_description = Some("from args".to_string());
    let mut prompt = ScriptedPrompt::new(["label"]);

    assert_eq!(RunOutcome::Success, harness.run(&mut prompt).0);
    assert_eq!(1, prompt.asked().len());
    assert_eq!("from args", harness.engine.runs()[0].2);
}

#[test]
fn closed_input_is_invalid_arguments() {
    let harness = Harness::new(
        SimulationRegistry::new()
            .register(simulation("alpha"))
            .register(simulation("beta")),
    );
    let mut prompt = ScriptedPrompt::default();

    let (outcome, _) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::InvalidArguments, outcome);
    assert!(harness.engine.runs().is_empty());
}

#[test]
fn invalid_configuration_short_circuits() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.config.reports_only = Some("sim-1000".to_string());
    harness.config.simulation = Some("sim".to_string());
    let mut prompt = ScriptedPrompt::default();

    let (outcome, stages) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::InvalidArguments, outcome);
    assert_eq!(vec![Stage::Terminated], stages);
}

#[test]
fn reports_only_needs_an_existing_record() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.config.reports_only = Some("missing-1000".to_string());
    let mut prompt = ScriptedPrompt::default();

    let (outcome, stages) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::InvalidArguments, outcome);
    assert_eq!(vec![Stage::ReportsOnly, Stage::Terminated], stages);
}

/// Record a run for real so there is something to report on.
fn record_earlier_run(harness: &Harness, completion: RunCompletion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let recorder = ResultRecorder::new(harness.config.recorder.clone(), runtime.handle().clone());
    let record = recorder
        .open(
            RunDescriptor::new("sim", "earlier", 1_000, ""),
            simulation("sim").descriptors(),
            vec![],
        )
        .unwrap();
    match completion {
        RunCompletion::Completed => record.close().unwrap(),
        RunCompletion::Interrupted => record.close_interrupted().unwrap(),
    }
}

#[test]
fn reports_only_reports_and_asserts_an_existing_run() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.assertions = FakeAssertions::declared(Ok(false));
    record_earlier_run(&harness, RunCompletion::Completed);

    harness.config.reports_only = Some("earlier-1000".to_string());
    let mut prompt = ScriptedPrompt::default();

    let (outcome, stages) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::AssertionsFailed, outcome);
    assert_eq!(
        vec![
            Stage::ReportsOnly,
            Stage::Reporting,
            Stage::Asserting,
            Stage::Terminated
        ],
        stages
    );
    assert!(harness.engine.runs().is_empty());
    assert_eq!(
        vec!["earlier-1000".to_string()],
        *harness.reports.generated.lock()
    );
}

#[test]
fn reports_only_refuses_an_interrupted_record() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.assertions = FakeAssertions::declared(Ok(true));
    record_earlier_run(&harness, RunCompletion::Interrupted);
    harness.config.reports_only = Some("earlier-1000".to_string());
    let mut prompt = ScriptedPrompt::default();

    let (outcome, stages) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::RunFailed, outcome);
    assert_eq!(vec![Stage::ReportsOnly, Stage::Terminated], stages);
    assert!(harness.reports.generated.lock().is_empty());
}

#[test]
fn reports_only_refuses_an_unterminated_record() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.assertions = FakeAssertions::declared(Ok(true));
    record_earlier_run(&harness, RunCompletion::Completed);

    // Cut the terminate event off, as a crash during the run would.
    let path = record_path(harness.dir.path(), "earlier-1000");
    let content = std::fs::read_to_string(&path).unwrap();
    let lines = content.lines().collect::<Vec<_>>();
    std::fs::write(&path, lines[..lines.len() - 1].join("\n") + "\n").unwrap();

    harness.config.reports_only = Some("earlier-1000".to_string());
    let mut prompt = ScriptedPrompt::default();

    let (outcome, stages) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::RunFailed, outcome);
    assert_eq!(vec![Stage::ReportsOnly, Stage::Terminated], stages);
    assert!(harness.reports.generated.lock().is_empty());
}

#[test]
fn interrupted_run_fails_without_reporting() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.config.mute = true;
    harness.engine.completion = RunCompletion::Interrupted;
    harness.assertions = FakeAssertions::declared(Ok(true));
    let mut prompt = ScriptedPrompt::default();

    let (outcome, stages) = harness.run(&mut prompt);

    assert_eq!(RunOutcome::RunFailed, outcome);
    assert!(!stages.contains(&Stage::Reporting));
    assert!(!stages.contains(&Stage::Asserting));
    assert!(harness.reports.generated.lock().is_empty());

    // The interrupted run is still listed in the run summary.
    let summaries = load_run_summaries(&run_summary_path(harness.dir.path())).unwrap();
    assert_eq!(1, summaries.len());
    assert!(!summaries[0].completed);
}

#[test]
fn engine_failure_is_run_failed() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.config.mute = true;
    harness.engine.fail = true;
    let mut prompt = ScriptedPrompt::default();

    assert_eq!(RunOutcome::RunFailed, harness.run(&mut prompt).0);
    // Nothing was committed, so nothing is listed in the run summary.
    assert!(!run_summary_path(harness.dir.path()).exists());
}

#[test]
fn assertion_results_decide_the_outcome() {
    let cases = [
        (FakeAssertions::declared(Ok(true)), RunOutcome::Success),
        (FakeAssertions::declared(Ok(false)), RunOutcome::AssertionsFailed),
        (
            FakeAssertions::declared(Err(anyhow::anyhow!("record is corrupt"))),
            RunOutcome::AssertionsFailed,
        ),
    ];

    for (assertions, expected) in cases {
        let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
        harness.config.mute = true;
        harness.assertions = assertions;
        let mut prompt = ScriptedPrompt::default();

        assert_eq!(expected, harness.run(&mut prompt).0);
    }
}

#[test]
fn report_failure_does_not_change_the_outcome() {
    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.config.mute = true;
    harness.reports.fail = true;
    let mut prompt = ScriptedPrompt::default();

    assert_eq!(RunOutcome::Success, harness.run(&mut prompt).0);

    let mut harness = Harness::new(SimulationRegistry::new().register(simulation("sim")));
    harness.config.mute = true;
    harness.config.generate_reports = false;
    let mut prompt = ScriptedPrompt::default();

    let (outcome, stages) = harness.run(&mut prompt);
    assert_eq!(RunOutcome::Success, outcome);
    assert!(!stages.contains(&Stage::Reporting));
}
