mod assertion;
mod bail;
mod event;
mod shutdown;

pub mod prelude {
    pub use crate::assertion::{
        Assertion, AssertionBuilder, AssertionMetric, AssertionTarget, Condition,
        ConditionBuilder, ResponseTimeBuilder, ResponseTimeStat,
    };
    pub use crate::bail::UserBailError;
    pub use crate::event::{
        default_run_label, is_valid_run_label, Event, EventError, EventKind, ExtraValue,
        GroupLifecycle, RequestEvent, RunCompletion, RunDescriptor, ScenarioDescriptor, Status,
        UserEventKind, UserLifecycle,
    };
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
