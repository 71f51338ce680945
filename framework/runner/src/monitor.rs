use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use volley_core::prelude::DelegatedShutdownListener;
use volley_recorder::EventSink;

const CPU_WARN_PERCENT: f32 = 80.0;
const QUEUE_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Monitor the load generator itself and report when it might be distorting the results.
///
/// Note that this won't stop the run proceeding, it will just log a warning to let the user know
/// that the measured response times may include time spent waiting on this process.
///
/// Two things are checked every [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL]:
/// - The CPU usage of this process, with respect to the number of cores, warning above 80%.
/// - The number of events waiting to be written to the run record, warning when it is above
///   `queue_warn_threshold`. A growing queue means the record writer can't keep up.
pub(crate) fn start_monitor(
    sink: EventSink,
    queue_warn_threshold: usize,
    mut stop_listener: DelegatedShutdownListener,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();
            let cpu_count = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            let mut last_queue_warning: Option<Instant> = None;

            loop {
                if stop_listener.should_shutdown() {
                    break;
                }

                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                if let Some(process) = sys.process(this_process_pid) {
                    let usage = (process.cpu_usage() / (cpu_count * 100) as f32) * 100.0;
                    if usage > CPU_WARN_PERCENT {
                        log::warn!("High CPU usage detected. Volley is using {:.2}% of the CPU, with {} available cores", usage, cpu_count);
                    }
                }

                let depth = sink.queue_depth();
                if depth > queue_warn_threshold
                    && last_queue_warning.map_or(true, |at| at.elapsed() >= QUEUE_WARN_INTERVAL)
                {
                    log::warn!("{depth} events are waiting to be written to the run record, the writer is falling behind");
                    last_queue_warning = Some(Instant::now());
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            }
        })?;

    Ok(())
}
