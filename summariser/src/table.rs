use tabled::settings::Style;
use tabled::{Table, Tabled};
use volley_summary_model::{AssertionResult, RequestStats, RunStatistics};

#[derive(Tabled)]
pub struct RequestRow {
    pub request: String,
    pub total: usize,
    pub ok: usize,
    pub ko: usize,
    #[tabled(display = "float2")]
    pub ko_percent: f64,
    pub min_ms: i64,
    pub p50_ms: i64,
    pub p95_ms: i64,
    pub p99_ms: i64,
    pub max_ms: i64,
    #[tabled(display = "float2")]
    pub mean_ms: f64,
}

#[derive(Tabled)]
pub struct GroupRow {
    pub group: String,
    pub count: usize,
    pub ok: usize,
    pub ko: usize,
    pub min_ms: i64,
    pub max_ms: i64,
    #[tabled(display = "float2")]
    pub mean_ms: f64,
}

#[derive(Tabled)]
pub struct AssertionRow {
    pub assertion: String,
    pub actual: String,
    pub result: &'static str,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

impl RequestRow {
    fn new(request: String, stats: &RequestStats) -> Self {
        let response_time = stats.response_time.clone().unwrap_or_default();
        Self {
            request,
            total: stats.total,
            ok: stats.ok,
            ko: stats.ko,
            ko_percent: stats.ko_percent(),
            min_ms: response_time.min,
            p50_ms: response_time.p50,
            p95_ms: response_time.p95,
            p99_ms: response_time.p99,
            max_ms: response_time.max,
            mean_ms: response_time.mean,
        }
    }
}

pub(crate) fn request_rows(stats: &RunStatistics) -> Vec<RequestRow> {
    std::iter::once(RequestRow::new("All requests".to_string(), &stats.global))
        .chain(
            stats
                .requests
                .iter()
                .map(|r| RequestRow::new(r.path.join(" / "), r)),
        )
        .collect()
}

pub(crate) fn group_rows(stats: &RunStatistics) -> Vec<GroupRow> {
    stats
        .groups
        .iter()
        .map(|g| GroupRow {
            group: g.path.join(" / "),
            count: g.count,
            ok: g.ok,
            ko: g.ko,
            min_ms: g.min_duration,
            max_ms: g.max_duration,
            mean_ms: g.mean_duration,
        })
        .collect()
}

pub(crate) fn print_summary(stats: &RunStatistics) {
    let started = chrono::DateTime::from_timestamp_millis(stats.start)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| stats.start.to_string());
    println!(
        "\nRun {} of {} started at {}{}",
        stats.run_id,
        stats.simulation_id,
        started,
        if stats.complete { "" } else { " (interrupted)" }
    );
    println!(
        "Users started: {}, ended: {}",
        stats.users_started, stats.users_ended
    );
    if stats.anomalies > 0 {
        println!(
            "{} requests received a response before they were sent",
            stats.anomalies
        );
    }

    println!("\nSummary of requests");
    let mut table = Table::new(request_rows(stats));
    table.with(Style::modern());
    println!("{table}");

    let groups = group_rows(stats);
    if !groups.is_empty() {
        println!("\nSummary of groups");
        let mut table = Table::new(groups);
        table.with(Style::modern());
        println!("{table}");
    }
}

pub(crate) fn print_assertions(results: &[AssertionResult]) {
    println!("\nAssertions");
    let rows = results.iter().map(|r| AssertionRow {
        assertion: r.assertion.to_string(),
        actual: r
            .actual
            .map(|a| float2(&a))
            .unwrap_or_else(|| "-".to_string()),
        result: if r.passed { "OK" } else { "KO" },
    });
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}
