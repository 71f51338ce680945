mod cli;
mod config;
mod context;
mod definition;
mod engine;
mod executor;
mod monitor;
mod orchestrator;
mod outcome;
mod progress;
mod prompt;
mod registry;
mod run;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::cli::VolleyCli;
    pub use crate::config::{ConfigError, FileConfig, FileRecorderConfig, RunConfig};
    pub use crate::context::{system_clock, Clock, RequestTimings, RunnerContext, UserContext};
    pub use crate::definition::{
        GlobalHook, HookResult, ScenarioDefinition, SimulationDefinition,
        SimulationDefinitionBuilder, UserBehaviour,
    };
    pub use crate::engine::{CompletedRun, ScenarioEngine, ThreadedScenarioEngine};
    pub use crate::executor::Executor;
    pub use crate::orchestrator::{Collaborators, Orchestrator, Stage};
    pub use crate::outcome::RunOutcome;
    pub use crate::prompt::{Prompt, PromptKind, ScriptedPrompt, TerminalPrompt};
    pub use crate::registry::{SimulationRegistry, SimulationSource};
    pub use crate::run::{run_cli, run_simulation, run_with_cli};
    pub use crate::types::VolleyResult;

    pub use volley_core::prelude::*;
}
