use std::io::BufRead as _;
use std::path::{Path, PathBuf};

use volley_core::prelude::{
    Assertion, Event, EventKind, GroupLifecycle, RequestEvent, RunCompletion, RunDescriptor,
    ScenarioDescriptor, UserLifecycle,
};

/// Holds one JSON encoded event per line, the init event first and the terminate event last.
pub const RECORD_FILE_NAME: &str = "simulation.log";

/// The directory that holds everything produced for `run_id`.
pub fn run_dir(results_dir: &Path, run_id: &str) -> PathBuf {
    results_dir.join(run_id)
}

pub fn record_path(results_dir: &Path, run_id: &str) -> PathBuf {
    run_dir(results_dir, run_id).join(RECORD_FILE_NAME)
}

pub fn record_exists(results_dir: &Path, run_id: &str) -> bool {
    record_path(results_dir, run_id).is_file()
}

/// Create the record file, refusing to overwrite a record that already exists.
pub(crate) fn create_record_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::File::options()
        .create_new(true)
        .write(true)
        .open(path)
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Failed to read run record {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed event on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Run record does not start with an init event")]
    MissingInit,
    #[error("Run record does not end with a terminate event")]
    MissingTerminate,
    #[error("Unexpected `{kind}` event on line {line}")]
    UnexpectedEvent { line: usize, kind: EventKind },
}

/// A fully read run record.
#[derive(Debug, Clone)]
pub struct RunRecord {
    run: RunDescriptor,
    scenarios: Vec<ScenarioDescriptor>,
    assertions: Vec<Assertion>,
    events: Vec<Event>,
    completion: RunCompletion,
}

impl RunRecord {
    /// Load the record for `run_id` from `results_dir`.
    pub fn load(results_dir: &Path, run_id: &str) -> Result<Self, RecordError> {
        let path = record_path(results_dir, run_id);
        let file = std::fs::File::open(&path).map_err(|source| RecordError::Open {
            path: path.clone(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Replay a record, checking that it is framed by exactly one init and one terminate event.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, RecordError> {
        let mut header = None;
        let mut completion = None;
        let mut events = Vec::new();

        for (index, line) in std::io::BufReader::new(reader).lines().enumerate() {
            let line_number = index + 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let event: Event =
                serde_json::from_str(&line).map_err(|source| RecordError::Parse {
                    line: line_number,
                    source,
                })?;

            if completion.is_some() {
                return Err(RecordError::UnexpectedEvent {
                    line: line_number,
                    kind: event.kind(),
                });
            }

            match event {
                Event::Init {
                    run,
                    scenarios,
                    assertions,
                } if header.is_none() => {
                    header = Some((run, scenarios, assertions));
                }
                event if header.is_none() => {
                    log::debug!("First event of the record is `{}`", event.kind());
                    return Err(RecordError::MissingInit);
                }
                Event::Init { .. } => {
                    return Err(RecordError::UnexpectedEvent {
                        line: line_number,
                        kind: EventKind::Init,
                    });
                }
                Event::Terminate { completion: c } => completion = Some(c),
                event => events.push(event),
            }
        }

        let (run, scenarios, assertions) = header.ok_or(RecordError::MissingInit)?;
        let completion = completion.ok_or(RecordError::MissingTerminate)?;

        Ok(Self {
            run,
            scenarios,
            assertions,
            events,
            completion,
        })
    }

    pub fn run(&self) -> &RunDescriptor {
        &self.run
    }

    pub fn run_id(&self) -> String {
        self.run.run_id()
    }

    pub fn scenarios(&self) -> &[ScenarioDescriptor] {
        &self.scenarios
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    /// Every event between init and terminate, in the order they were written.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn completion(&self) -> RunCompletion {
        self.completion
    }

    pub fn is_complete(&self) -> bool {
        self.completion == RunCompletion::Completed
    }

    pub fn requests(&self) -> impl Iterator<Item = &RequestEvent> {
        self.events.iter().filter_map(|e| match e {
            Event::Request(r) => Some(r),
            _ => None,
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupLifecycle> {
        self.events.iter().filter_map(|e| match e {
            Event::Group(g) => Some(g),
            _ => None,
        })
    }

    pub fn users(&self) -> impl Iterator<Item = &UserLifecycle> {
        self.events.iter().filter_map(|e| match e {
            Event::User(u) => Some(u),
            _ => None,
        })
    }
}
