mod config;
mod error;
mod record;
mod recorder;
mod writer;

pub use config::RecorderConfig;
pub use error::RecorderError;
pub use record::{record_exists, record_path, run_dir, RecordError, RunRecord, RECORD_FILE_NAME};
pub use recorder::{EventSink, RecorderHandle, ResultRecorder};
