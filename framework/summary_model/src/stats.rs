use itertools::Itertools;
use serde::{Deserialize, Serialize};
use volley_core::prelude::{RequestEvent, Status, UserEventKind};
use volley_recorder::RunRecord;

/// Response time distribution of a set of requests, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeStats {
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub std_dev: f64,
    pub p50: i64,
    pub p75: i64,
    pub p95: i64,
    pub p99: i64,
}

impl ResponseTimeStats {
    /// `None` if there are no samples.
    pub fn from_samples(samples: &[i64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let sorted = samples.iter().copied().sorted_unstable().collect::<Vec<_>>();
        let count = sorted.len() as f64;
        let mean = sorted.iter().map(|v| *v as f64).sum::<f64>() / count;
        let variance = sorted
            .iter()
            .map(|v| (*v as f64 - mean).powi(2))
            .sum::<f64>()
            / count;

        Some(Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            std_dev: variance.sqrt(),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        })
    }
}

/// Nearest rank percentile of already sorted, non-empty samples.
pub fn percentile(sorted: &[i64], rank: f64) -> i64 {
    let rank = rank.clamp(0.0, 100.0);
    let index = ((rank / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[index.saturating_sub(1).min(sorted.len() - 1)]
}

/// Counts and response times for requests sharing a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStats {
    /// Group hierarchy followed by the request name. Empty for the global statistics.
    pub path: Vec<String>,
    pub total: usize,
    pub ok: usize,
    pub ko: usize,
    pub response_time: Option<ResponseTimeStats>,
}

impl RequestStats {
    fn from_samples<'a>(path: Vec<String>, samples: impl Iterator<Item = &'a Sample>) -> Self {
        let mut ok = 0;
        let mut ko = 0;
        let mut response_times = Vec::new();
        for sample in samples {
            match sample.status {
                Status::Ok => ok += 1,
                Status::Ko => ko += 1,
            }
            response_times.push(sample.response_time);
        }

        Self {
            path,
            total: ok + ko,
            ok,
            ko,
            response_time: ResponseTimeStats::from_samples(&response_times),
        }
    }

    pub fn ok_percent(&self) -> f64 {
        percent(self.ok, self.total)
    }

    pub fn ko_percent(&self) -> f64 {
        percent(self.ko, self.total)
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Counts and durations for one group path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub path: Vec<String>,
    pub count: usize,
    pub ok: usize,
    pub ko: usize,
    pub min_duration: i64,
    pub max_duration: i64,
    pub mean_duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Sample {
    group_hierarchy: Vec<String>,
    name: String,
    response_time: i64,
    status: Status,
}

impl Sample {
    fn full_path(&self) -> Vec<String> {
        let mut path = self.group_hierarchy.clone();
        path.push(self.name.clone());
        path
    }
}

impl From<&RequestEvent> for Sample {
    fn from(request: &RequestEvent) -> Self {
        Self {
            group_hierarchy: request.group_hierarchy.clone(),
            name: request.name.clone(),
            response_time: request.response_time(),
            status: request.status,
        }
    }
}

/// Aggregated statistics of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub run_id: String,
    pub simulation_id: String,
    pub description: String,
    pub start: i64,
    pub complete: bool,
    pub users_started: usize,
    pub users_ended: usize,
    /// Requests whose response started before the request did.
    pub anomalies: usize,
    pub global: RequestStats,
    /// One entry per distinct request path, sorted by path.
    pub requests: Vec<RequestStats>,
    /// One entry per distinct group path, sorted by path.
    pub groups: Vec<GroupStats>,
    #[serde(skip)]
    samples: Vec<Sample>,
}

impl RunStatistics {
    pub fn from_record(record: &RunRecord) -> Self {
        let samples = record.requests().map(Sample::from).collect::<Vec<_>>();
        let anomalies = record.requests().filter(|r| r.is_anomalous()).count();
        if anomalies > 0 {
            log::warn!(
                "Run `{}` has {anomalies} requests whose response started before the request",
                record.run_id()
            );
        }

        let (users_started, users_ended) =
            record
                .users()
                .fold((0, 0), |(started, ended), user| match user.event {
                    UserEventKind::Start => (started + 1, ended),
                    UserEventKind::End => (started, ended + 1),
                });

        let requests = samples
            .iter()
            .into_group_map_by(|s| s.full_path())
            .into_iter()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(path, samples)| RequestStats::from_samples(path, samples.into_iter()))
            .collect();

        let groups = record
            .groups()
            .into_group_map_by(|g| g.group_hierarchy.clone())
            .into_iter()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(path, groups)| {
                let durations = groups.iter().map(|g| g.duration()).collect::<Vec<_>>();
                let ok = groups.iter().filter(|g| g.status.is_ok()).count();
                GroupStats {
                    path,
                    count: groups.len(),
                    ok,
                    ko: groups.len() - ok,
                    min_duration: durations.iter().copied().min().unwrap_or_default(),
                    max_duration: durations.iter().copied().max().unwrap_or_default(),
                    mean_duration: durations.iter().sum::<i64>() as f64
                        / durations.len().max(1) as f64,
                }
            })
            .collect();

        let run = record.run();
        Self {
            run_id: run.run_id(),
            simulation_id: run.simulation_id.clone(),
            description: run.description.clone(),
            start: run.start,
            complete: record.is_complete(),
            users_started,
            users_ended,
            anomalies,
            global: RequestStats::from_samples(Vec::new(), samples.iter()),
            requests,
            groups,
            samples,
        }
    }

    /// Statistics for a path of group names, optionally ending with a request name.
    ///
    /// A path naming a request exactly wins over a group of the same name. Returns `None` if
    /// nothing in the run lives under `path`.
    pub fn for_path(&self, path: &[String]) -> Option<RequestStats> {
        if path.is_empty() {
            return Some(self.global.clone());
        }

        let samples = self.samples_under(path);
        if samples.is_empty() {
            None
        } else {
            Some(RequestStats::from_samples(path.to_vec(), samples.into_iter()))
        }
    }

    /// Sorted response times of the requests [RunStatistics::for_path] would aggregate.
    pub fn response_times_for(&self, path: &[String]) -> Vec<i64> {
        self.samples_under(path)
            .iter()
            .map(|s| s.response_time)
            .sorted_unstable()
            .collect()
    }

    fn samples_under(&self, path: &[String]) -> Vec<&Sample> {
        if path.is_empty() {
            return self.samples.iter().collect();
        }

        let exact = self
            .samples
            .iter()
            .filter(|s| s.group_hierarchy.len() + 1 == path.len() && s.full_path() == path)
            .collect::<Vec<_>>();
        if !exact.is_empty() {
            return exact;
        }

        self.samples
            .iter()
            .filter(|s| s.group_hierarchy.starts_with(path))
            .collect()
    }
}
