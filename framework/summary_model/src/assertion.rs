use serde::{Deserialize, Serialize};
use volley_core::prelude::{Assertion, AssertionMetric, AssertionTarget, ResponseTimeStat};

use crate::stats::{percentile, RunStatistics};

/// The outcome of one assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub assertion: Assertion,
    /// The measured value, `None` if it could not be measured.
    pub actual: Option<f64>,
    pub passed: bool,
    pub message: String,
}

pub fn evaluate_assertions(assertions: &[Assertion], stats: &RunStatistics) -> Vec<AssertionResult> {
    assertions
        .iter()
        .map(|assertion| evaluate_assertion(assertion, stats))
        .collect()
}

pub fn evaluate_assertion(assertion: &Assertion, stats: &RunStatistics) -> AssertionResult {
    let path = match &assertion.target {
        AssertionTarget::Global => Vec::new(),
        AssertionTarget::Details(path) => path.clone(),
    };

    let Some(request_stats) = stats.for_path(&path) else {
        return AssertionResult {
            assertion: assertion.clone(),
            actual: None,
            passed: false,
            message: format!("{assertion}: no requests found under `{}`", path.join(" / ")),
        };
    };

    let actual = match assertion.metric {
        AssertionMetric::ResponseTime(stat) => {
            request_stats
                .response_time
                .as_ref()
                .map(|response_time| match stat {
                    ResponseTimeStat::Min => response_time.min as f64,
                    ResponseTimeStat::Max => response_time.max as f64,
                    ResponseTimeStat::Mean => response_time.mean,
                    ResponseTimeStat::StdDev => response_time.std_dev,
                    // The fixed percentiles are not enough here, recompute from the samples.
                    ResponseTimeStat::Percentile(rank) => percentile_for(stats, &path, rank),
                })
        }
        AssertionMetric::AllRequestsCount => Some(request_stats.total as f64),
        AssertionMetric::SuccessfulRequestsCount => Some(request_stats.ok as f64),
        AssertionMetric::SuccessfulRequestsPercent => Some(request_stats.ok_percent()),
        AssertionMetric::FailedRequestsCount => Some(request_stats.ko as f64),
        AssertionMetric::FailedRequestsPercent => Some(request_stats.ko_percent()),
    };

    match actual {
        Some(actual) => {
            let passed = assertion.condition.holds(actual);
            AssertionResult {
                assertion: assertion.clone(),
                actual: Some(actual),
                passed,
                message: format!(
                    "{assertion}: {} (actual: {actual})",
                    if passed { "OK" } else { "KO" }
                ),
            }
        }
        None => AssertionResult {
            assertion: assertion.clone(),
            actual: None,
            passed: false,
            message: format!("{assertion}: no response times recorded"),
        },
    }
}

fn percentile_for(stats: &RunStatistics, path: &[String], rank: f64) -> f64 {
    let sorted = stats.response_times_for(path);
    if sorted.is_empty() {
        0.0
    } else {
        percentile(&sorted, rank) as f64
    }
}
