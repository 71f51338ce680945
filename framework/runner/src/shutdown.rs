use tokio::runtime::Handle;
use tokio::signal;
use volley_core::prelude::ShutdownHandle;

/// Fire `handle` when the process receives Ctrl-C.
pub(crate) fn start_shutdown_listener(runtime: &Handle, handle: ShutdownHandle) {
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, shutting down...");
                handle.shutdown();
            }
            Err(e) => log::warn!("Unable to listen for Ctrl-C, the run can only end on its own: {e}"),
        }
    });
}
