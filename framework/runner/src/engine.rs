use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use volley_core::prelude::{
    RunCompletion, RunDescriptor, ScenarioDescriptor, ShutdownHandle, ShutdownSignalError,
    UserBailError, UserEventKind,
};
use volley_recorder::{RecorderError, ResultRecorder};

use crate::config::RunConfig;
use crate::context::{system_clock, Clock, RunnerContext, UserContext};
use crate::definition::{SimulationDefinition, UserBehaviour};
use crate::executor::Executor;
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::shutdown::start_shutdown_listener;

/// Executes a simulation and records it.
pub trait ScenarioEngine {
    /// Run `simulation` under `label` and return once its record is closed.
    ///
    /// An `Err` means the run could not be recorded properly. A run that was stopped early but
    /// whose record was committed is an `Ok` with [RunCompletion::Interrupted].
    fn run(
        &self,
        simulation: &SimulationDefinition,
        label: &str,
        description: &str,
    ) -> anyhow::Result<CompletedRun>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub run: RunDescriptor,
    pub scenarios: Vec<ScenarioDescriptor>,
    pub completion: RunCompletion,
    /// Events in the record, not counting the terminate event.
    pub events_written: u64,
}

impl CompletedRun {
    pub fn run_id(&self) -> String {
        self.run.run_id()
    }
}

/// Runs every simulated user on its own thread, with async work handed to a shared runtime.
///
/// Each user runs its scenario's behaviour once. User ids count from 1 across every scenario of
/// the run, and each user's thread is named `<scenario>-<user id>`. The run ends when every user has finished or the
/// shutdown handle fires, whichever comes first. Once the shutdown handle has fired, every later
/// run is recorded as interrupted.
pub struct ThreadedScenarioEngine {
    executor: Arc<Executor>,
    recorder: ResultRecorder,
    shutdown_handle: ShutdownHandle,
    clock: Clock,
    show_progress: bool,
    queue_warn_threshold: usize,
}

impl ThreadedScenarioEngine {
    pub fn new(config: &RunConfig) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("volley-worker")
            .build()
            .context("Failed to create Tokio runtime")?;
        let shutdown_handle = ShutdownHandle::new();
        let recorder = ResultRecorder::new(config.recorder.clone(), runtime.handle().clone())
            .with_shutdown_handle(shutdown_handle.clone());
        let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));

        Ok(Self {
            executor,
            recorder,
            shutdown_handle,
            clock: system_clock,
            show_progress: config.show_progress,
            queue_warn_threshold: config.queue_warn_threshold,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }

    /// Interrupt the current run when the process receives Ctrl-C.
    pub fn listen_for_ctrl_c(&self) {
        start_shutdown_listener(self.executor.handle(), self.shutdown_handle.clone());
    }
}

impl ScenarioEngine for ThreadedScenarioEngine {
    fn run(
        &self,
        simulation: &SimulationDefinition,
        label: &str,
        description: &str,
    ) -> anyhow::Result<CompletedRun> {
        let run = RunDescriptor::new(simulation.name(), label, (self.clock)(), description);
        let scenarios = simulation.descriptors();
        let run_id = run.run_id();

        let record = self
            .recorder
            .open(
                run.clone(),
                scenarios.clone(),
                simulation.assertions().to_vec(),
            )
            .with_context(|| format!("Failed to open the record for run {run_id}"))?;

        log::info!("Running simulation {} as run {}", simulation.name(), run_id);

        let runner_context = Arc::new(RunnerContext::new(
            run.clone(),
            self.executor.clone(),
            self.shutdown_handle.clone(),
        ));

        if let Some(setup_fn) = simulation.setup_fn() {
            if let Err(e) = setup_fn(&runner_context) {
                log_close_failure(record.close_interrupted(), &run_id);
                return Err(e.context("Simulation setup failed"));
            }
        }

        // Stops the progress bar and the monitor once the users are done.
        let run_scope = ShutdownHandle::new();
        let finished_users = Arc::new(AtomicUsize::new(0));

        if self.show_progress {
            if let Err(e) = start_progress(
                simulation.total_users(),
                finished_users.clone(),
                run_scope.new_listener(),
            ) {
                log::warn!("Failed to start the progress bar: {e}");
            }
        }
        if let Err(e) = start_monitor(
            record.sink(),
            self.queue_warn_threshold,
            run_scope.new_listener(),
        ) {
            log::warn!("Failed to start the resource monitor: {e}");
        }

        let mut handles = Vec::with_capacity(simulation.total_users());
        let mut next_user_id = 1u64;
        'spawn: for scenario in simulation.scenarios() {
            for _ in 0..scenario.users {
                let user_id = next_user_id;
                next_user_id += 1;

                let context = UserContext::new(
                    scenario.name.clone(),
                    user_id,
                    runner_context.clone(),
                    record.sink(),
                    self.shutdown_handle.new_listener(),
                    self.clock,
                );
                let behaviour = scenario.behaviour;
                let finished_users = finished_users.clone();

                let spawned = std::thread::Builder::new()
                    .name(format!("{}-{}", scenario.name, user_id))
                    .spawn(move || {
                        run_user(context, behaviour);
                        finished_users.fetch_add(1, Ordering::Relaxed);
                    });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        log::error!("Failed to start user {user_id}, abandoning the run: {e}");
                        self.shutdown_handle.shutdown();
                        break 'spawn;
                    }
                }
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                log::error!("A user panicked, its end event is missing from the record");
            }
        }

        if let Some(teardown_fn) = simulation.teardown_fn() {
            if let Err(e) = teardown_fn(&runner_context) {
                log::error!("Simulation teardown failed: {e:?}");
            }
        }

        run_scope.shutdown();

        let completion = if self.shutdown_handle.is_shutdown() {
            RunCompletion::Interrupted
        } else {
            RunCompletion::Completed
        };
        match completion {
            RunCompletion::Completed => record.close(),
            RunCompletion::Interrupted => record.close_interrupted(),
        }
        .with_context(|| format!("Failed to commit the record for run {run_id}"))?;

        log::info!(
            "Run {run_id} finished as {completion:?} with {} events recorded",
            record.events_written()
        );

        Ok(CompletedRun {
            run,
            scenarios,
            completion,
            events_written: record.events_written(),
        })
    }
}

fn run_user(mut context: UserContext, behaviour: UserBehaviour) {
    let user_id = context.user_id();
    let started = context.now();

    if let Err(e) = context.record_user(UserEventKind::Start, started) {
        log::warn!("User {user_id} could not start: {e}");
        return;
    }

    if !context.shutdown_listener().should_shutdown() {
        if let Err(e) = behaviour(&mut context) {
            if e.chain().any(|c| c.is::<UserBailError>()) {
                log::info!("User {user_id} bailed: {e}");
            } else if e.chain().any(|c| c.is::<ShutdownSignalError>()) {
                log::debug!("User {user_id} stopped by shutdown");
            } else {
                log::error!("User {user_id} failed: {e:?}");
            }
        }
    }

    if let Err(e) = context.record_user(UserEventKind::End, started) {
        log::warn!("Could not record the end of user {user_id}: {e}");
    }
}

fn log_close_failure(result: Result<(), RecorderError>, run_id: &str) {
    if let Err(e) = result {
        log::warn!("Failed to close the record for run {run_id}: {e}");
    }
}
