use pretty_assertions::assert_eq;
use volley_recorder::{RecorderConfig, RunRecord};
use volley_runner::prelude::{
    Event, HookResult, RunCompletion, RunConfig, RunnerContext, ScenarioEngine, Status,
    SimulationDefinitionBuilder, ThreadedScenarioEngine, UserBailError, UserContext,
    UserEventKind,
};

fn fixed_clock() -> i64 {
    1_000
}

fn engine_in(dir: &std::path::Path) -> ThreadedScenarioEngine {
    let config = RunConfig {
        show_progress: false,
        recorder: RecorderConfig::default().with_results_dir(dir),
        ..Default::default()
    };
    ThreadedScenarioEngine::new(&config)
        .unwrap()
        .with_clock(fixed_clock)
}

fn ok_request(ctx: &mut UserContext) -> HookResult {
    ctx.request("ping", |_| Ok(()))?;
    Ok(())
}

#[test]
fn propagate_error_in_setup_hook() {
    fn setup(_ctx: &RunnerContext) -> HookResult {
        Err(anyhow::anyhow!("Error in setup hook"))
    }

    let dir = tempfile::tempdir().unwrap();
    let simulation = SimulationDefinitionBuilder::new("setup_fails")
        .use_setup(setup)
        .use_scenario("Users", 2, ok_request)
        .build()
        .unwrap();

    let result = engine_in(dir.path()).run(&simulation, "setup", "");

    let err = result.unwrap_err();
    assert_eq!("Simulation setup failed", err.to_string());
    assert_eq!("Error in setup hook", err.root_cause().to_string());

    // The record is still closed, as interrupted and without any users.
    let record = RunRecord::load(dir.path(), "setup-1000").unwrap();
    assert_eq!(RunCompletion::Interrupted, record.completion());
    assert_eq!(0, record.users().count());
}

#[test]
fn bailing_user_does_not_stop_the_others() {
    fn behaviour(ctx: &mut UserContext) -> HookResult {
        if ctx.user_id() == 1 {
            return Err(UserBailError::new("first user gives up").into());
        }
        ok_request(ctx)
    }

    let dir = tempfile::tempdir().unwrap();
    let simulation = SimulationDefinitionBuilder::new("bail")
        .use_scenario("Users", 3, behaviour)
        .build()
        .unwrap();

    let completed = engine_in(dir.path())
        .run(&simulation, "bail", "")
        .unwrap();
    assert_eq!(RunCompletion::Completed, completed.completion);

    let record = RunRecord::load(dir.path(), "bail-1000").unwrap();
    assert_eq!(2, record.requests().count());
    // Every user, including the one that bailed, has both lifecycle events.
    assert_eq!(
        3,
        record
            .users()
            .filter(|u| u.event == UserEventKind::End)
            .count()
    );
}

#[test]
fn failing_request_is_recorded_and_ends_the_user() {
    fn behaviour(ctx: &mut UserContext) -> HookResult {
        ctx.group("checkout", |ctx| {
            ctx.request("pay", |_| -> anyhow::Result<()> {
                Err(anyhow::anyhow!("card declined"))
            })
        })?;
        ctx.request("never reached", |_| Ok(()))?;
        Ok(())
    }

    let dir = tempfile::tempdir().unwrap();
    let simulation = SimulationDefinitionBuilder::new("declined")
        .use_scenario("Buyers", 1, behaviour)
        .build()
        .unwrap();

    engine_in(dir.path())
        .run(&simulation, "declined", "")
        .unwrap();

    let record = RunRecord::load(dir.path(), "declined-1000").unwrap();
    let requests = record.requests().collect::<Vec<_>>();
    assert_eq!(1, requests.len());
    assert_eq!(Status::Ko, requests[0].status);
    assert_eq!(Some("card declined".to_string()), requests[0].message);
    assert_eq!(vec!["checkout".to_string()], requests[0].group_hierarchy);

    let groups = record.groups().collect::<Vec<_>>();
    assert_eq!(1, groups.len());
    assert_eq!(Status::Ko, groups[0].status);

    // The group is closed after the request inside it.
    let kinds = record
        .events()
        .iter()
        .map(|e| e.kind().to_string())
        .collect::<Vec<_>>();
    assert_eq!(vec!["user", "request", "group", "user"], kinds);
}

#[test]
fn teardown_error_does_not_fail_the_run() {
    fn teardown(_ctx: &RunnerContext) -> HookResult {
        Err(anyhow::anyhow!("Error in teardown hook"))
    }

    let dir = tempfile::tempdir().unwrap();
    let simulation = SimulationDefinitionBuilder::new("teardown_fails")
        .use_scenario("Users", 1, ok_request)
        .use_teardown(teardown)
        .build()
        .unwrap();

    let completed = engine_in(dir.path())
        .run(&simulation, "teardown", "")
        .unwrap();
    assert_eq!(RunCompletion::Completed, completed.completion);
}

#[test]
fn requested_shutdown_interrupts_the_run() {
    fn behaviour(ctx: &mut UserContext) -> HookResult {
        ctx.runner_context().request_shutdown();
        // Async work is cancelled once the shutdown has been requested.
        ctx.executor().execute_in_place(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(())
        })
    }

    let dir = tempfile::tempdir().unwrap();
    let simulation = SimulationDefinitionBuilder::new("shutdown")
        .use_scenario("Users", 2, behaviour)
        .build()
        .unwrap();

    let completed = engine_in(dir.path())
        .run(&simulation, "shutdown", "")
        .unwrap();
    assert_eq!(RunCompletion::Interrupted, completed.completion);

    let record = RunRecord::load(dir.path(), "shutdown-1000").unwrap();
    assert!(!record.is_complete());
    assert!(matches!(record.events().first(), Some(Event::User(_))));
}

#[test]
fn user_ids_are_unique_across_scenarios() {
    fn named_after_thread(ctx: &mut UserContext) -> HookResult {
        let thread = std::thread::current().name().unwrap_or_default().to_string();
        ctx.request(&thread, |_| Ok(()))
    }

    let dir = tempfile::tempdir().unwrap();
    let simulation = SimulationDefinitionBuilder::new("two_scenarios")
        .use_scenario("Browsers", 2, named_after_thread)
        .use_scenario("Buyers", 1, named_after_thread)
        .build()
        .unwrap();

    engine_in(dir.path())
        .run(&simulation, "ids", "")
        .unwrap();

    let record = RunRecord::load(dir.path(), "ids-1000").unwrap();
    let mut users = record
        .requests()
        .map(|r| (r.user_id, r.scenario_name.clone(), r.name.clone()))
        .collect::<Vec<_>>();
    users.sort();
    assert_eq!(
        vec![
            (1, "Browsers".to_string(), "Browsers-1".to_string()),
            (2, "Browsers".to_string(), "Browsers-2".to_string()),
            (3, "Buyers".to_string(), "Buyers-3".to_string()),
        ],
        users
    );
}
