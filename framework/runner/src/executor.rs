use std::future::Future;

use tokio::runtime::{Handle, Runtime};
use volley_core::prelude::{ShutdownHandle, ShutdownSignalError};

/// Runs async code for simulated users, which themselves run on plain threads.
#[derive(Debug)]
pub struct Executor {
    runtime: Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// The future is cancelled if the run is shut down, in which case a [ShutdownSignalError] is
    /// returned. Submitting a future which does not support cancelling may prevent the run from
    /// shutting down.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// The future is not cancelled on shutdown and the run does not wait for it. Inside a user
    /// behaviour prefer [Executor::execute_in_place] so the work is finished, and timed, before the
    /// behaviour moves on.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }

    pub(crate) fn handle(&self) -> &Handle {
        self.runtime.handle()
    }
}
