use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use volley_core::prelude::{RunCompletion, RunDescriptor, ScenarioDescriptor};

mod assertion;
mod stats;

pub use assertion::{evaluate_assertion, evaluate_assertions, AssertionResult};
pub use stats::{percentile, GroupStats, RequestStats, ResponseTimeStats, RunStatistics};

/// Name of the run summary index kept at the root of the results directory.
pub const RUN_SUMMARY_FILE_NAME: &str = "run_summary.jsonl";

/// Produces report artifacts for a recorded run.
///
/// Only called once the run's record has been closed.
pub trait ReportGenerator {
    /// Generate the report for `run_id` and return the location of its entry artifact.
    fn generate(&self, run_id: &str) -> anyhow::Result<PathBuf>;
}

/// Checks a recorded run against the assertions it declared.
pub trait AssertionEvaluator {
    fn has_assertions(&self, run_id: &str) -> anyhow::Result<bool>;

    /// `true` if every declared assertion holds.
    fn evaluate(&self, run_id: &str) -> anyhow::Result<bool>;
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    pub run_id: String,
    /// The name of the simulation that was run
    pub simulation_id: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in milliseconds.
    pub started_at: i64,
    pub description: String,
    /// Planned number of users for each scenario
    pub scenarios: HashMap<String, usize>,
    /// Whether every user ran to completion
    pub completed: bool,
    /// Number of events written to the record, including the init event
    pub events_written: u64,
    /// The version of Volley that was used for this run
    pub volley_version: String,
}

impl RunSummary {
    pub fn new(
        run: &RunDescriptor,
        scenarios: &[ScenarioDescriptor],
        completion: RunCompletion,
        events_written: u64,
        volley_version: String,
    ) -> Self {
        Self {
            run_id: run.run_id(),
            simulation_id: run.simulation_id.clone(),
            started_at: run.start,
            description: run.description.clone(),
            scenarios: scenarios
                .iter()
                .map(|s| (s.name.clone(), s.users))
                .collect(),
            completed: completion == RunCompletion::Completed,
            events_written,
            volley_version,
        }
    }
}

/// Path of the run summary index inside `results_dir`.
pub fn run_summary_path(results_dir: &Path) -> PathBuf {
    results_dir.join(RUN_SUMMARY_FILE_NAME)
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    let mut line = serde_json::to_vec(run_summary)?;
    line.push(b'\n');
    file.write_all(&line)?;
    Ok(())
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_run_summaries(path: &Path) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}
