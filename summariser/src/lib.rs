use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use volley_recorder::{run_dir, RunRecord};
use volley_summary_model::{
    evaluate_assertions, AssertionEvaluator, AssertionResult, ReportGenerator, RunStatistics,
};

mod table;

/// Name of the statistics report written next to the run record.
pub const SUMMARY_FILE_NAME: &str = "summary.json";
/// Name of the assertion results written next to the run record.
pub const ASSERTIONS_FILE_NAME: &str = "assertions.json";

fn load_record(results_dir: &Path, run_id: &str) -> anyhow::Result<RunRecord> {
    RunRecord::load(results_dir, run_id)
        .with_context(|| format!("Failed to load the record of run {run_id}"))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Writes the statistics of a run as JSON and prints them as tables.
#[derive(Debug, Clone)]
pub struct SummaryReportGenerator {
    results_dir: PathBuf,
    print: bool,
}

impl SummaryReportGenerator {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
            print: true,
        }
    }

    /// Only write the report file.
    pub fn quiet(mut self) -> Self {
        self.print = false;
        self
    }
}

impl ReportGenerator for SummaryReportGenerator {
    fn generate(&self, run_id: &str) -> anyhow::Result<PathBuf> {
        let record = load_record(&self.results_dir, run_id)?;
        let stats = RunStatistics::from_record(&record);

        let path = run_dir(&self.results_dir, run_id).join(SUMMARY_FILE_NAME);
        write_json(&path, &stats)?;

        if self.print {
            table::print_summary(&stats);
        }

        Ok(path)
    }
}

/// Evaluates the assertions a run declared in its record.
#[derive(Debug, Clone)]
pub struct RecordAssertionEvaluator {
    results_dir: PathBuf,
    print: bool,
}

impl RecordAssertionEvaluator {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
            print: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.print = false;
        self
    }

    /// Evaluate every declared assertion and write the results next to the record.
    pub fn results(&self, run_id: &str) -> anyhow::Result<Vec<AssertionResult>> {
        let record = load_record(&self.results_dir, run_id)?;
        let stats = RunStatistics::from_record(&record);
        let results = evaluate_assertions(record.assertions(), &stats);

        write_json(
            &run_dir(&self.results_dir, run_id).join(ASSERTIONS_FILE_NAME),
            &results,
        )?;

        Ok(results)
    }
}

impl AssertionEvaluator for RecordAssertionEvaluator {
    fn has_assertions(&self, run_id: &str) -> anyhow::Result<bool> {
        Ok(!load_record(&self.results_dir, run_id)?
            .assertions()
            .is_empty())
    }

    fn evaluate(&self, run_id: &str) -> anyhow::Result<bool> {
        let results = self.results(run_id)?;

        if self.print {
            table::print_assertions(&results);
        }
        for failed in results.iter().filter(|r| !r.passed) {
            log::warn!("Assertion failed: {}", failed.message);
        }

        Ok(results.iter().all(|r| r.passed))
    }
}
