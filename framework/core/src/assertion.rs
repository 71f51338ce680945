use serde::{Deserialize, Serialize};

/// A pass/fail condition declared by a simulation and evaluated against the statistics of a
/// finished run.
///
/// Assertions are plain data. They travel with the run record's init event so that a run can be
/// evaluated long after the simulation that declared them has exited.
///
/// ```rust
/// use volley_core::prelude::*;
///
/// let assertion = Assertion::global().response_time().max().lt(100.0);
/// assert_eq!("global: max of response time is less than 100", assertion.to_string());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub target: AssertionTarget,
    pub metric: AssertionMetric,
    pub condition: Condition,
}

/// The statistics an assertion applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "path", rename_all = "snake_case")]
pub enum AssertionTarget {
    /// All requests of the run.
    Global,
    /// Requests under a path of group names, optionally ending with a request name.
    Details(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTimeStat {
    Min,
    Max,
    Mean,
    StdDev,
    Percentile(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionMetric {
    ResponseTime(ResponseTimeStat),
    AllRequestsCount,
    SuccessfulRequestsCount,
    SuccessfulRequestsPercent,
    FailedRequestsCount,
    FailedRequestsPercent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Lt(f64),
    Lte(f64),
    Gt(f64),
    Gte(f64),
    Is(f64),
    /// Inclusive on both ends.
    Between(f64, f64),
    In(Vec<f64>),
}

impl Condition {
    pub fn holds(&self, actual: f64) -> bool {
        match self {
            Condition::Lt(v) => actual < *v,
            Condition::Lte(v) => actual <= *v,
            Condition::Gt(v) => actual > *v,
            Condition::Gte(v) => actual >= *v,
            Condition::Is(v) => actual == *v,
            Condition::Between(low, high) => *low <= actual && actual <= *high,
            Condition::In(values) => values.iter().any(|v| *v == actual),
        }
    }
}

impl Assertion {
    pub fn global() -> AssertionBuilder {
        AssertionBuilder {
            target: AssertionTarget::Global,
        }
    }

    /// Target the requests below a group path, or a single request when the last element of the
    /// path is a request name.
    pub fn details<S: Into<String>>(path: impl IntoIterator<Item = S>) -> AssertionBuilder {
        AssertionBuilder {
            target: AssertionTarget::Details(path.into_iter().map(Into::into).collect()),
        }
    }
}

pub struct AssertionBuilder {
    target: AssertionTarget,
}

impl AssertionBuilder {
    pub fn response_time(self) -> ResponseTimeBuilder {
        ResponseTimeBuilder {
            target: self.target,
        }
    }

    pub fn all_requests_count(self) -> ConditionBuilder {
        self.metric(AssertionMetric::AllRequestsCount)
    }

    pub fn successful_requests_count(self) -> ConditionBuilder {
        self.metric(AssertionMetric::SuccessfulRequestsCount)
    }

    pub fn successful_requests_percent(self) -> ConditionBuilder {
        self.metric(AssertionMetric::SuccessfulRequestsPercent)
    }

    pub fn failed_requests_count(self) -> ConditionBuilder {
        self.metric(AssertionMetric::FailedRequestsCount)
    }

    pub fn failed_requests_percent(self) -> ConditionBuilder {
        self.metric(AssertionMetric::FailedRequestsPercent)
    }

    fn metric(self, metric: AssertionMetric) -> ConditionBuilder {
        ConditionBuilder {
            target: self.target,
            metric,
        }
    }
}

pub struct ResponseTimeBuilder {
    target: AssertionTarget,
}

impl ResponseTimeBuilder {
    pub fn min(self) -> ConditionBuilder {
        self.stat(ResponseTimeStat::Min)
    }

    pub fn max(self) -> ConditionBuilder {
        self.stat(ResponseTimeStat::Max)
    }

    pub fn mean(self) -> ConditionBuilder {
        self.stat(ResponseTimeStat::Mean)
    }

    pub fn std_dev(self) -> ConditionBuilder {
        self.stat(ResponseTimeStat::StdDev)
    }

    /// `rank` is a percentage, e.g. `95.0`.
    pub fn percentile(self, rank: f64) -> ConditionBuilder {
        self.stat(ResponseTimeStat::Percentile(rank))
    }

    fn stat(self, stat: ResponseTimeStat) -> ConditionBuilder {
        ConditionBuilder {
            target: self.target,
            metric: AssertionMetric::ResponseTime(stat),
        }
    }
}

pub struct ConditionBuilder {
    target: AssertionTarget,
    metric: AssertionMetric,
}

impl ConditionBuilder {
    pub fn lt(self, value: f64) -> Assertion {
        self.condition(Condition::Lt(value))
    }

    pub fn lte(self, value: f64) -> Assertion {
        self.condition(Condition::Lte(value))
    }

    pub fn gt(self, value: f64) -> Assertion {
        self.condition(Condition::Gt(value))
    }

    pub fn gte(self, value: f64) -> Assertion {
        self.condition(Condition::Gte(value))
    }

    pub fn is(self, value: f64) -> Assertion {
        self.condition(Condition::Is(value))
    }

    pub fn between(self, low: f64, high: f64) -> Assertion {
        self.condition(Condition::Between(low, high))
    }

    pub fn within(self, values: Vec<f64>) -> Assertion {
        self.condition(Condition::In(values))
    }

    pub fn condition(self, condition: Condition) -> Assertion {
        Assertion {
            target: self.target,
            metric: self.metric,
            condition,
        }
    }
}

impl std::fmt::Display for AssertionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssertionTarget::Global => f.write_str("global"),
            AssertionTarget::Details(path) => f.write_str(&path.join(" / ")),
        }
    }
}

impl std::fmt::Display for AssertionMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssertionMetric::ResponseTime(ResponseTimeStat::Min) => f.write_str("min of response time"),
            AssertionMetric::ResponseTime(ResponseTimeStat::Max) => f.write_str("max of response time"),
            AssertionMetric::ResponseTime(ResponseTimeStat::Mean) => {
                f.write_str("mean of response time")
            }
            AssertionMetric::ResponseTime(ResponseTimeStat::StdDev) => {
                f.write_str("standard deviation of response time")
            }
            AssertionMetric::ResponseTime(ResponseTimeStat::Percentile(rank)) => {
                write!(f, "{rank}th percentile of response time")
            }
            AssertionMetric::AllRequestsCount => f.write_str("count of all requests"),
            AssertionMetric::SuccessfulRequestsCount => f.write_str("count of successful requests"),
            AssertionMetric::SuccessfulRequestsPercent => {
                f.write_str("percentage of successful requests")
            }
            AssertionMetric::FailedRequestsCount => f.write_str("count of failed requests"),
            AssertionMetric::FailedRequestsPercent => f.write_str("percentage of failed requests"),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Lt(v) => write!(f, "is less than {v}"),
            Condition::Lte(v) => write!(f, "is less than or equal to {v}"),
            Condition::Gt(v) => write!(f, "is greater than {v}"),
            Condition::Gte(v) => write!(f, "is greater than or equal to {v}"),
            Condition::Is(v) => write!(f, "is {v}"),
            Condition::Between(low, high) => write!(f, "is between {low} and {high}"),
            Condition::In(values) => write!(f, "is one of {values:?}"),
        }
    }
}

impl std::fmt::Display for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} {}", self.target, self.metric, self.condition)
    }
}
