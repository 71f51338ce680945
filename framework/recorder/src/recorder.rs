use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use volley_core::prelude::{
    Assertion, Event, RunCompletion, RunDescriptor, ScenarioDescriptor, ShutdownHandle,
};

use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::record::{create_record_file, record_path};
use crate::writer::{start_record_write_task, RecordSink, WriterMessage, WriterResult, WriterStats};

/// Opens run records and makes sure there is never more than one writer per run.
///
/// The recorder itself is cheap to clone; every clone shares the set of open runs.
#[derive(Debug, Clone)]
pub struct ResultRecorder {
    config: RecorderConfig,
    runtime: Handle,
    shutdown: Option<ShutdownHandle>,
    open_runs: Arc<Mutex<HashSet<String>>>,
}

impl ResultRecorder {
    pub fn new(config: RecorderConfig, runtime: Handle) -> Self {
        Self {
            config,
            runtime,
            shutdown: None,
            open_runs: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Fire this handle if the record cannot be written, so that the run is abandoned.
    pub fn with_shutdown_handle(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Create the record for `run` and write its init event.
    ///
    /// Fails with [RecorderError::AlreadyOpen] if this run is already being recorded, and with
    /// [RecorderError::Create] if a record for the run id already exists on disk.
    pub fn open(
        &self,
        run: RunDescriptor,
        scenarios: Vec<ScenarioDescriptor>,
        assertions: Vec<Assertion>,
    ) -> Result<RecorderHandle, RecorderError> {
        let run_id = run.run_id();
        let path = record_path(&self.config.results_dir, &run_id);

        self.open_with(run, scenarios, assertions, || {
            let file = create_record_file(&path).map_err(|source| RecorderError::Create {
                path: path.clone(),
                source,
            })?;
            log::info!("Recording run `{run_id}` to {}", path.display());
            Ok(tokio::fs::File::from_std(file))
        })
    }

    pub(crate) fn open_with<S, F>(
        &self,
        run: RunDescriptor,
        scenarios: Vec<ScenarioDescriptor>,
        assertions: Vec<Assertion>,
        create_sink: F,
    ) -> Result<RecorderHandle, RecorderError>
    where
        S: RecordSink,
        F: FnOnce() -> Result<S, RecorderError>,
    {
        let run_id = run.run_id();
        let init = Event::Init {
            run,
            scenarios,
            assertions,
        };
        init.validate()?;

        if !self.open_runs.lock().insert(run_id.clone()) {
            return Err(RecorderError::AlreadyOpen(run_id));
        }

        let sink = match create_sink() {
            Ok(sink) => sink,
            Err(e) => {
                self.open_runs.lock().remove(&run_id);
                return Err(e);
            }
        };

        let stats = Arc::new(WriterStats::default());
        let (sender, done) = start_record_write_task(
            &self.runtime,
            sink,
            &self.config,
            stats.clone(),
            self.shutdown.clone(),
        );

        let intake = EventSink { sender, stats };
        // The writer cannot have stopped yet, nothing has been written.
        intake.enqueue(init)?;

        Ok(RecorderHandle {
            run_id,
            intake,
            done: Mutex::new(Some(done)),
            open_runs: self.open_runs.clone(),
        })
    }
}

/// Submits events to a run record. Clone one for each producer.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: UnboundedSender<WriterMessage>,
    stats: Arc<WriterStats>,
}

impl EventSink {
    /// Queue `event` for writing without waiting for it to be written.
    pub fn submit(&self, event: Event) -> Result<(), RecorderError> {
        if event.is_reserved() {
            return Err(RecorderError::ReservedEvent(event.kind()));
        }
        event.validate()?;

        self.enqueue(event)
    }

    /// Events accepted but not yet written.
    pub fn queue_depth(&self) -> usize {
        self.stats.queue_depth.load(Ordering::Relaxed)
    }

    pub fn events_written(&self) -> u64 {
        self.stats.events_written.load(Ordering::Relaxed)
    }

    fn enqueue(&self, event: Event) -> Result<(), RecorderError> {
        self.stats.queue_depth.fetch_add(1, Ordering::Relaxed);
        self.sender
            .send(WriterMessage::Event(event))
            .map_err(|_| {
                self.stats.queue_depth.fetch_sub(1, Ordering::Relaxed);
                RecorderError::Closed
            })
    }
}

/// The open record of one run.
///
/// Dropping the handle without closing it terminates the record as interrupted straight away,
/// without waiting for it to be committed. Events submitted afterwards through a remaining
/// [EventSink] are not recorded.
pub struct RecorderHandle {
    run_id: String,
    intake: EventSink,
    done: Mutex<Option<oneshot::Receiver<WriterResult>>>,
    open_runs: Arc<Mutex<HashSet<String>>>,
}

impl RecorderHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// A producer side handle for the same record.
    pub fn sink(&self) -> EventSink {
        self.intake.clone()
    }

    pub fn submit(&self, event: Event) -> Result<(), RecorderError> {
        self.intake.submit(event)
    }

    pub fn queue_depth(&self) -> usize {
        self.intake.queue_depth()
    }

    pub fn events_written(&self) -> u64 {
        self.intake.events_written()
    }

    pub fn is_closed(&self) -> bool {
        self.done.lock().is_none()
    }

    /// Write the terminate event, flush and wait until the record is safe to read.
    ///
    /// Closing an already closed handle does nothing.
    pub fn close(&self) -> Result<(), RecorderError> {
        self.finish(RunCompletion::Completed)
    }

    /// Like [RecorderHandle::close] but marks the record as holding only part of the run.
    pub fn close_interrupted(&self) -> Result<(), RecorderError> {
        self.finish(RunCompletion::Interrupted)
    }

    fn finish(&self, completion: RunCompletion) -> Result<(), RecorderError> {
        let Some(done) = self.done.lock().take() else {
            log::debug!("Record for run `{}` is already closed", self.run_id);
            return Ok(());
        };

        if self
            .intake
            .sender
            .send(WriterMessage::Terminate(completion))
            .is_err()
        {
            log::debug!("Write task already stopped, collecting its result");
        }

        let result = wait_for_writer(done);
        self.open_runs.lock().remove(&self.run_id);

        match result {
            Some(Ok(completion)) => {
                log::info!("Closed record for run `{}` ({completion:?})", self.run_id);
                Ok(())
            }
            Some(Err(e)) => Err(RecorderError::Storage(e)),
            None => Err(RecorderError::WriterLost),
        }
    }
}

impl Drop for RecorderHandle {
    fn drop(&mut self) {
        if self.done.get_mut().take().is_some() {
            log::warn!(
                "Record for run `{}` dropped without being closed, marking it interrupted",
                self.run_id
            );
            let _ = self
                .intake
                .sender
                .send(WriterMessage::Terminate(RunCompletion::Interrupted));
            self.open_runs.lock().remove(&self.run_id);
        }
    }
}

/// Block until the write task reports its result.
///
/// Returns `None` if the task went away without reporting, for example because the runtime it was
/// running on was shut down.
fn wait_for_writer(mut done: oneshot::Receiver<WriterResult>) -> Option<WriterResult> {
    let wait_started = Instant::now();
    let mut notify_timer = Instant::now();

    loop {
        match done.try_recv() {
            Ok(result) => {
                log::debug!(
                    "Record flushed after {} ms",
                    wait_started.elapsed().as_millis()
                );
                return Some(result);
            }
            Err(oneshot::error::TryRecvError::Closed) => return None,
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        if notify_timer.elapsed().as_secs() > 10 {
            log::warn!(
                "Still waiting for the run record to flush after {} seconds.",
                wait_started.elapsed().as_secs()
            );
            notify_timer = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(5));
    }
}
