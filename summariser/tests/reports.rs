use pretty_assertions::assert_eq;
use volley_core::prelude::{
    Assertion, Event, RequestEvent, RunDescriptor, ScenarioDescriptor, Status,
};
use volley_recorder::{run_dir, RecorderConfig, ResultRecorder};
use volley_summariser::{
    RecordAssertionEvaluator, SummaryReportGenerator, ASSERTIONS_FILE_NAME,
};
use volley_summary_model::{AssertionEvaluator, AssertionResult, ReportGenerator, RunStatistics};

fn request(name: &str, response_time: i64, status: Status) -> Event {
    Event::Request(RequestEvent {
        scenario_name: "Users".to_string(),
        user_id: 1,
        group_hierarchy: vec![],
        name: name.to_string(),
        request_start_date: 1_000,
        request_end_date: 1_000,
        response_start_date: 1_000 + response_time,
        response_end_date: 1_000 + response_time,
        status,
        message: None,
        extra_info: vec![],
    })
}

/// Record a run with the given requests and assertions and return its id.
fn record_run(dir: &std::path::Path, label: &str, assertions: Vec<Assertion>) -> String {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let recorder = ResultRecorder::new(
        RecorderConfig::default().with_results_dir(dir),
        runtime.handle().clone(),
    );
    let handle = recorder
        .open(
            RunDescriptor::new("reports", label, 1_000, ""),
            vec![ScenarioDescriptor::new("Users", 1)],
            assertions,
        )
        .unwrap();

    for _ in 0..9 {
        handle.submit(request("home", 20, Status::Ok)).unwrap();
    }
    handle.submit(request("search", 500, Status::Ko)).unwrap();
    handle.close().unwrap();

    handle.run_id().to_string()
}

#[test]
fn summary_report_is_written_next_to_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = record_run(dir.path(), "summary", vec![]);

    let path = SummaryReportGenerator::new(dir.path())
        .quiet()
        .generate(&run_id)
        .unwrap();

    assert_eq!(run_dir(dir.path(), &run_id).join("summary.json"), path);
    let stats: RunStatistics =
        serde_json::from_reader(std::fs::File::open(path).unwrap()).unwrap();
    assert_eq!("summary-1000", stats.run_id);
    assert_eq!(10, stats.global.total);
    assert_eq!(1, stats.global.ko);
    assert_eq!(
        vec![vec!["home".to_string()], vec!["search".to_string()]],
        stats.requests.iter().map(|r| r.path.clone()).collect::<Vec<_>>()
    );
}

#[test]
fn missing_run_is_an_error() {
    let dir = tempfile::tempdir().unwrap();

    assert!(SummaryReportGenerator::new(dir.path())
        .quiet()
        .generate("nothing-1")
        .is_err());
    assert!(RecordAssertionEvaluator::new(dir.path())
        .has_assertions("nothing-1")
        .is_err());
}

#[test]
fn run_without_assertions_has_nothing_to_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = record_run(dir.path(), "none", vec![]);

    let evaluator = RecordAssertionEvaluator::new(dir.path()).quiet();
    assert!(!evaluator.has_assertions(&run_id).unwrap());
    assert!(evaluator.evaluate(&run_id).unwrap());
}

#[test]
fn declared_assertions_are_evaluated_and_saved() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = record_run(
        dir.path(),
        "asserted",
        vec![
            Assertion::details(["home"]).response_time().max().lt(100.0),
            Assertion::global().failed_requests_percent().lt(5.0),
        ],
    );

    let evaluator = RecordAssertionEvaluator::new(dir.path()).quiet();
    assert!(evaluator.has_assertions(&run_id).unwrap());
    assert!(!evaluator.evaluate(&run_id).unwrap());

    let saved: Vec<AssertionResult> = serde_json::from_reader(
        std::fs::File::open(run_dir(dir.path(), &run_id).join(ASSERTIONS_FILE_NAME)).unwrap(),
    )
    .unwrap();
    assert_eq!(
        vec![true, false],
        saved.iter().map(|r| r.passed).collect::<Vec<_>>()
    );
    assert_eq!(Some(10.0), saved[1].actual);
}
