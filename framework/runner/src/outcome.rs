use std::process::ExitCode;

/// How a run of the orchestrator ended. Each outcome maps to a fixed process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum RunOutcome {
    #[display("success")]
    Success,
    #[display("invalid arguments")]
    InvalidArguments,
    #[display("assertions failed")]
    AssertionsFailed,
    #[display("no simulation available")]
    NoSimulationAvailable,
    #[display("run failed")]
    RunFailed,
}

impl RunOutcome {
    pub const fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::InvalidArguments => 1,
            RunOutcome::AssertionsFailed => 2,
            RunOutcome::NoSimulationAvailable => 3,
            RunOutcome::RunFailed => 4,
        }
    }

    pub fn is_success(self) -> bool {
        self == RunOutcome::Success
    }
}

impl From<RunOutcome> for ExitCode {
    fn from(outcome: RunOutcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}
