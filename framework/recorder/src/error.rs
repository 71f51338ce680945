use std::path::PathBuf;

use volley_core::prelude::{EventError, EventKind};

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("A recorder is already open for run `{0}`")]
    AlreadyOpen(String),
    #[error("Failed to create the run record at {}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("The `{0}` event is written by the recorder and cannot be submitted")]
    ReservedEvent(EventKind),
    #[error("Invalid event: {0}")]
    InvalidEvent(#[from] EventError),
    #[error("The recorder is closed and no longer accepts events")]
    Closed,
    #[error("Failed to write the run record, the recorded results are incomplete")]
    Storage(#[source] std::io::Error),
    #[error("The record write task stopped without reporting a result")]
    WriterLost,
}
