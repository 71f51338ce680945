use serde::{Deserialize, Serialize};

use crate::assertion::Assertion;

/// Identifies one execution of a simulation.
///
/// Created once by the engine when it commits to running a simulation and never modified after
/// that. The [RunDescriptor::run_id] derived from it is the key under which the run record is
/// stored, and the only thing the report and assertion stages need to find it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDescriptor {
    /// The name of the simulation that was selected to run.
    pub simulation_id: String,
    /// The run label, restricted to `[A-Za-z0-9_-]*`. See [is_valid_run_label].
    pub label: String,
    /// Unix timestamp in milliseconds at which the run started.
    pub start: i64,
    /// Free text supplied by the user, may be empty.
    pub description: String,
}

impl RunDescriptor {
    pub fn new(
        simulation_id: impl Into<String>,
        label: impl Into<String>,
        start: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            simulation_id: simulation_id.into(),
            label: label.into(),
            start,
            description: description.into(),
        }
    }

    /// The run id, `<label>-<start>`.
    pub fn run_id(&self) -> String {
        format!("{}-{}", self.label, self.start)
    }
}

/// A scenario that a run declares up front, with the number of users it plans to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    pub name: String,
    pub users: usize,
}

impl ScenarioDescriptor {
    pub fn new(name: impl Into<String>, users: usize) -> Self {
        Self {
            name: name.into(),
            users,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Ko,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Ko if either status is Ko.
    pub fn and(self, other: Status) -> Status {
        if self.is_ok() && other.is_ok() {
            Status::Ok
        } else {
            Status::Ko
        }
    }
}

impl<T, E> From<&Result<T, E>> for Status {
    fn from(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Status::Ok
        } else {
            Status::Ko
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserEventKind {
    Start,
    End,
}

/// How a run came to an end. Carried by [Event::Terminate].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunCompletion {
    /// Every simulated user ran to completion.
    Completed,
    /// The run was stopped early, the record holds only part of the run.
    Interrupted,
}

/// A value captured by a simulated user and carried through to reporting.
///
/// The recorder never looks inside these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExtraValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        ExtraValue::Bool(value)
    }
}

impl From<i64> for ExtraValue {
    fn from(value: i64) -> Self {
        ExtraValue::Int(value)
    }
}

impl From<f64> for ExtraValue {
    fn from(value: f64) -> Self {
        ExtraValue::Float(value)
    }
}

impl From<String> for ExtraValue {
    fn from(value: String) -> Self {
        ExtraValue::Text(value)
    }
}

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        ExtraValue::Text(value.to_string())
    }
}

impl std::fmt::Display for ExtraValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtraValue::Bool(b) => write!(f, "{b}"),
            ExtraValue::Int(i) => write!(f, "{i}"),
            ExtraValue::Float(v) => write!(f, "{v}"),
            ExtraValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A simulated user entering or leaving the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLifecycle {
    pub scenario_name: String,
    pub user_id: u64,
    pub event: UserEventKind,
    pub start_date: i64,
    pub end_date: i64,
}

/// Entry and exit of a group within a user's flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupLifecycle {
    pub scenario_name: String,
    pub user_id: u64,
    /// Outer to inner nesting path, the last element is this group's own name.
    pub group_hierarchy: Vec<String>,
    pub start_date: i64,
    pub end_date: i64,
    pub status: Status,
}

impl GroupLifecycle {
    pub fn duration(&self) -> i64 {
        self.end_date - self.start_date
    }
}

/// One timed request made by a simulated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub scenario_name: String,
    pub user_id: u64,
    pub group_hierarchy: Vec<String>,
    pub name: String,
    pub request_start_date: i64,
    pub request_end_date: i64,
    pub response_start_date: i64,
    pub response_end_date: i64,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_info: Vec<ExtraValue>,
}

impl RequestEvent {
    /// Elapsed time from the start of sending the request to the end of receiving the response.
    ///
    /// This deliberately includes the time spent building and sending the request, it is not the
    /// network round trip alone.
    pub fn response_time(&self) -> i64 {
        self.response_end_date - self.request_start_date
    }

    /// The response started arriving before the request started being sent.
    ///
    /// Allowed by the protocol but reported as an anomaly.
    pub fn is_anomalous(&self) -> bool {
        self.response_start_date < self.request_start_date
    }
}

/// Every message a run's producers hand to the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Always the first event of a run.
    Init {
        run: RunDescriptor,
        scenarios: Vec<ScenarioDescriptor>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        assertions: Vec<Assertion>,
    },
    /// Always the last event of a run.
    Terminate { completion: RunCompletion },
    User(UserLifecycle),
    Group(GroupLifecycle),
    Request(RequestEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Init,
    Terminate,
    User,
    Group,
    Request,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Init => "init",
            EventKind::Terminate => "terminate",
            EventKind::User => "user",
            EventKind::Group => "group",
            EventKind::Request => "request",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("{kind} event ends at {end} before it starts at {start}")]
    EndsBeforeStart { kind: EventKind, start: i64, end: i64 },
    #[error("init event declares no scenarios")]
    NoScenarios,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Init { .. } => EventKind::Init,
            Event::Terminate { .. } => EventKind::Terminate,
            Event::User(_) => EventKind::User,
            Event::Group(_) => EventKind::Group,
            Event::Request(_) => EventKind::Request,
        }
    }

    /// Init and Terminate are written by the recorder itself.
    pub fn is_reserved(&self) -> bool {
        matches!(self, Event::Init { .. } | Event::Terminate { .. })
    }

    /// The user that produced this event, if it came from a simulated user.
    pub fn user_id(&self) -> Option<u64> {
        match self {
            Event::User(e) => Some(e.user_id),
            Event::Group(e) => Some(e.user_id),
            Event::Request(e) => Some(e.user_id),
            Event::Init { .. } | Event::Terminate { .. } => None,
        }
    }

    pub fn scenario_name(&self) -> Option<&str> {
        match self {
            Event::User(e) => Some(&e.scenario_name),
            Event::Group(e) => Some(&e.scenario_name),
            Event::Request(e) => Some(&e.scenario_name),
            Event::Init { .. } | Event::Terminate { .. } => None,
        }
    }

    /// Check that no time span inside the event runs backwards.
    ///
    /// The relation between the request and response timestamps of a [RequestEvent] is not
    /// checked here, see [RequestEvent::is_anomalous].
    pub fn validate(&self) -> Result<(), EventError> {
        let kind = self.kind();
        let check = |start: i64, end: i64| {
            if end < start {
                Err(EventError::EndsBeforeStart { kind, start, end })
            } else {
                Ok(())
            }
        };

        match self {
            Event::Init { scenarios, .. } if scenarios.is_empty() => Err(EventError::NoScenarios),
            Event::Init { .. } | Event::Terminate { .. } => Ok(()),
            Event::User(e) => check(e.start_date, e.end_date),
            Event::Group(e) => check(e.start_date, e.end_date),
            Event::Request(e) => {
                check(e.request_start_date, e.request_end_date)?;
                check(e.response_start_date, e.response_end_date)?;
                check(e.request_start_date, e.response_end_date)
            }
        }
    }
}

/// Whether `label` only uses characters allowed in a run label: ASCII letters, digits, `-` and `_`.
///
/// The empty label is valid here; callers decide whether to substitute a default.
pub fn is_valid_run_label(label: &str) -> bool {
    label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// The label used when the user does not supply one.
///
/// Takes the last path segment of the simulation id, lower cases it and replaces anything that is
/// not allowed in a label with `_`.
pub fn default_run_label(simulation_id: &str) -> String {
    let last = simulation_id
        .rsplit("::")
        .next()
        .unwrap_or(simulation_id)
        .rsplit('.')
        .next()
        .unwrap_or(simulation_id);

    last.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
