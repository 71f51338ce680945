use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use volley_core::prelude::DelegatedShutdownListener;

/// Displays a progress bar while the run is going to show how many users have finished.
pub(crate) fn start_progress(
    total_users: usize,
    finished_users: Arc<AtomicUsize>,
    mut stop_listener: DelegatedShutdownListener,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let pb = ProgressBar::new(total_users as u64);
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} users finished [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
            pb.set_style(style);

            loop {
                pb.set_position(finished_users.load(Ordering::Relaxed) as u64);

                if stop_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                std::thread::sleep(Duration::from_millis(250));
            }
        })?;

    Ok(())
}
