use std::sync::Arc;

use anyhow::Context as _;
use volley_core::prelude::{
    DelegatedShutdownListener, Event, ExtraValue, GroupLifecycle, RequestEvent, RunDescriptor,
    ShutdownHandle, Status, UserBailError, UserEventKind, UserLifecycle,
};
use volley_recorder::{EventSink, RecorderError};

use crate::executor::Executor;

/// Source of timestamps, in milliseconds since the Unix epoch.
pub type Clock = fn() -> i64;

/// The wall clock.
pub fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Shared by the simulation hooks and every user of one run.
#[derive(Debug)]
pub struct RunnerContext {
    run: RunDescriptor,
    executor: Arc<Executor>,
    shutdown_handle: ShutdownHandle,
}

impl RunnerContext {
    pub(crate) fn new(
        run: RunDescriptor,
        executor: Arc<Executor>,
        shutdown_handle: ShutdownHandle,
    ) -> Self {
        Self {
            run,
            executor,
            shutdown_handle,
        }
    }

    pub fn run(&self) -> &RunDescriptor {
        &self.run
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// Abandon the run. Users see the signal through their shutdown listener and the record is
    /// closed as interrupted.
    pub fn request_shutdown(&self) {
        self.shutdown_handle.shutdown();
    }
}

/// Explicit timings for a request that was measured by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimings {
    pub request_start: i64,
    pub request_end: i64,
    pub response_start: i64,
    pub response_end: i64,
}

impl RequestTimings {
    /// Timings for an exchange that can't be split into send and receive.
    pub fn opaque(start: i64, end: i64) -> Self {
        Self {
            request_start: start,
            request_end: start,
            response_start: end,
            response_end: end,
        }
    }
}

#[derive(Debug)]
struct OpenGroup {
    name: String,
    start: i64,
    status: Status,
}

/// The view a single simulated user has of the run.
///
/// Everything the user records goes through here so that the scenario name, the user id and the
/// current group hierarchy are filled in for it.
pub struct UserContext {
    scenario: String,
    user_id: u64,
    runner_context: Arc<RunnerContext>,
    sink: EventSink,
    shutdown_listener: DelegatedShutdownListener,
    clock: Clock,
    groups: Vec<OpenGroup>,
}

impl UserContext {
    pub(crate) fn new(
        scenario: String,
        user_id: u64,
        runner_context: Arc<RunnerContext>,
        sink: EventSink,
        shutdown_listener: DelegatedShutdownListener,
        clock: Clock,
    ) -> Self {
        Self {
            scenario,
            user_id,
            runner_context,
            sink,
            shutdown_listener,
            clock,
            groups: Vec::new(),
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext> {
        &self.runner_context
    }

    pub fn executor(&self) -> &Arc<Executor> {
        self.runner_context.executor()
    }

    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    pub fn group_hierarchy(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.name.clone()).collect()
    }

    /// Run `f` and record it as a request called `name`.
    ///
    /// The request is `OK` if `f` succeeds and `KO` with the error as its message otherwise. The
    /// result of `f` is handed back unchanged.
    pub fn request<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let start = self.now();
        let result = f(self);
        let end = self.now();

        self.record_request(
            name,
            RequestTimings::opaque(start, end),
            Status::from(&result),
            result.as_ref().err().map(|e| e.to_string()),
            Vec::new(),
        )?;

        result
    }

    /// Record a request that was timed by the caller.
    pub fn record_request(
        &mut self,
        name: &str,
        timings: RequestTimings,
        status: Status,
        message: Option<String>,
        extra_info: Vec<ExtraValue>,
    ) -> anyhow::Result<()> {
        if !status.is_ok() {
            for group in &mut self.groups {
                group.status = Status::Ko;
            }
        }

        self.emit(Event::Request(RequestEvent {
            scenario_name: self.scenario.clone(),
            user_id: self.user_id,
            group_hierarchy: self.group_hierarchy(),
            name: name.to_string(),
            request_start_date: timings.request_start,
            request_end_date: timings.request_end,
            response_start_date: timings.response_start,
            response_end_date: timings.response_end,
            status,
            message,
            extra_info,
        }))
    }

    /// Run `f` inside a group called `name`.
    ///
    /// Requests recorded by `f` are nested under the group. The group is `KO` if `f` fails or any
    /// request inside it is `KO`.
    pub fn group<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        self.groups.push(OpenGroup {
            name: name.to_string(),
            start: self.now(),
            status: Status::Ok,
        });
        let hierarchy = self.group_hierarchy();

        let result = f(self);

        let end = self.now();
        let Some(group) = self.groups.pop() else {
            anyhow::bail!("Group [{name}] was closed by someone else");
        };

        self.emit(Event::Group(GroupLifecycle {
            scenario_name: self.scenario.clone(),
            user_id: self.user_id,
            group_hierarchy: hierarchy,
            start_date: group.start,
            end_date: end,
            status: group.status.and(Status::from(&result)),
        }))?;

        result
    }

    pub(crate) fn record_user(&self, event: UserEventKind, start: i64) -> anyhow::Result<()> {
        self.emit(Event::User(UserLifecycle {
            scenario_name: self.scenario.clone(),
            user_id: self.user_id,
            event,
            start_date: start,
            end_date: self.now(),
        }))
    }

    fn emit(&self, event: Event) -> anyhow::Result<()> {
        match self.sink.submit(event) {
            Ok(()) => Ok(()),
            // The record is gone, nothing this user does can be recorded any more.
            Err(RecorderError::Closed) => Err(UserBailError::new("The run record is closed").into()),
            Err(e) => Err(e).context("Failed to record event"),
        }
    }
}
