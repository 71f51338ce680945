use std::path::{Path, PathBuf};

use serde::Deserialize;
use volley_core::prelude::is_valid_run_label;
use volley_recorder::RecorderConfig;

use crate::cli::VolleyCli;

const DEFAULT_QUEUE_WARN_THRESHOLD: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("A simulation can't be selected when only generating reports")]
    ReportsOnlyWithSimulation,
    #[error("Invalid run id `{0}`, expected `<label>-<start timestamp>`")]
    InvalidRunId(String),
    #[error("Recorder setting `flush_every_events` must be at least 1")]
    ZeroFlushBatch,
}

/// Run configuration as it can be written in a TOML file.
///
/// ```toml
/// simulation = "basic_requests"
/// results_folder = "target/volley"
/// mute = true
///
/// [recorder]
/// flush_every_events = 512
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub simulation: Option<String>,
    pub results_folder: Option<PathBuf>,
    pub run_description: Option<String>,
    pub no_reports: Option<bool>,
    pub mute: Option<bool>,
    pub no_progress: Option<bool>,
    pub queue_warn_threshold: Option<usize>,
    pub recorder: FileRecorderConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileRecorderConfig {
    pub flush_every_events: Option<usize>,
    pub flush_interval_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Everything the orchestrator needs to know about how to run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Preferred simulation, matched by name against the discovered simulations.
    pub simulation: Option<String>,
    /// Run id to generate reports for, without running anything.
    pub reports_only: Option<String>,
    pub run_description: Option<String>,
    pub generate_reports: bool,
    /// Never prompt.
    pub mute: bool,
    pub show_progress: bool,
    /// Recorder queue depth above which the monitor warns.
    pub queue_warn_threshold: usize,
    pub recorder: RecorderConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            simulation: None,
            reports_only: None,
            run_description: None,
            generate_reports: true,
            mute: false,
            show_progress: true,
            queue_warn_threshold: DEFAULT_QUEUE_WARN_THRESHOLD,
            recorder: RecorderConfig::default(),
        }
    }
}

impl RunConfig {
    /// Build the configuration from the command line, layered over the config file it names.
    ///
    /// Flags that are not set on the command line keep the value from the file, or the default.
    pub fn from_cli(cli: &VolleyCli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let config = Self::default().merge_file(file).merge_cli(cli);
        config.validate()?;

        Ok(config)
    }

    pub fn merge_file(mut self, file: FileConfig) -> Self {
        if file.simulation.is_some() {
            self.simulation = file.simulation;
        }
        if let Some(results_folder) = file.results_folder {
            self.recorder.results_dir = results_folder;
        }
        if file.run_description.is_some() {
            self.run_description = file.run_description;
        }
        if let Some(no_reports) = file.no_reports {
            self.generate_reports = !no_reports;
        }
        if let Some(mute) = file.mute {
            self.mute = mute;
        }
        if let Some(no_progress) = file.no_progress {
            self.show_progress = !no_progress;
        }
        if let Some(threshold) = file.queue_warn_threshold {
            self.queue_warn_threshold = threshold;
        }
        if let Some(flush_every_events) = file.recorder.flush_every_events {
            self.recorder.flush_every_events = flush_every_events;
        }
        if let Some(flush_interval_ms) = file.recorder.flush_interval_ms {
            self.recorder.flush_interval_ms = flush_interval_ms;
        }
        self
    }

    pub fn merge_cli(mut self, cli: &VolleyCli) -> Self {
        if cli.simulation.is_some() {
            self.simulation = cli.simulation.clone();
        }
        if cli.reports_only.is_some() {
            self.reports_only = cli.reports_only.clone();
        }
        if let Some(results_folder) = &cli.results_folder {
            self.recorder.results_dir = results_folder.clone();
        }
        if cli.run_description.is_some() {
            self.run_description = cli.run_description.clone();
        }
        if cli.no_reports {
            self.generate_reports = false;
        }
        if cli.mute {
            self.mute = true;
        }
        if cli.no_progress {
            self.show_progress = false;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(run_id) = &self.reports_only {
            if self.simulation.is_some() {
                return Err(ConfigError::ReportsOnlyWithSimulation);
            }
            if !is_valid_run_id(run_id) {
                return Err(ConfigError::InvalidRunId(run_id.clone()));
            }
        }

        if self.recorder.flush_every_events == 0 {
            return Err(ConfigError::ZeroFlushBatch);
        }

        Ok(())
    }

    pub fn results_dir(&self) -> &Path {
        &self.recorder.results_dir
    }
}

/// A run id is a non-empty valid label, a dash, then the start timestamp.
fn is_valid_run_id(run_id: &str) -> bool {
    match run_id.rsplit_once('-') {
        Some((label, start)) => {
            !label.is_empty() && is_valid_run_label(label) && start.parse::<i64>().is_ok()
        }
        None => false,
    }
}
