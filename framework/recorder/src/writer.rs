use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::runtime::Handle;
use tokio::select;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use volley_core::prelude::{Event, RunCompletion, ShutdownHandle};

use crate::config::RecorderConfig;

pub(crate) enum WriterMessage {
    Event(Event),
    Terminate(RunCompletion),
}

pub(crate) type WriterResult = std::io::Result<RunCompletion>;

/// Counters shared between the producers and the write task.
#[derive(Debug, Default)]
pub(crate) struct WriterStats {
    /// Accepted onto the intake queue but not yet written.
    pub(crate) queue_depth: AtomicUsize,
    pub(crate) events_written: AtomicU64,
}

/// Destination of a run record.
pub(crate) trait RecordSink: AsyncWrite + Unpin + Send + 'static {
    /// Make everything written so far durable.
    fn sync(&mut self) -> impl Future<Output = std::io::Result<()>> + Send;
}

impl RecordSink for tokio::fs::File {
    fn sync(&mut self) -> impl Future<Output = std::io::Result<()>> + Send {
        self.sync_all()
    }
}

/// Start the only task that writes to the record.
///
/// Everything sent on the returned sender is written in the order it was received. The task ends
/// after writing a terminate event, either because one was requested or because every sender was
/// dropped. If a write fails the task stops, fires `shutdown` so the run is abandoned and reports
/// the error on the returned receiver.
pub(crate) fn start_record_write_task<S: RecordSink>(
    runtime: &Handle,
    sink: S,
    config: &RecorderConfig,
    stats: Arc<WriterStats>,
    shutdown: Option<ShutdownHandle>,
) -> (UnboundedSender<WriterMessage>, oneshot::Receiver<WriterResult>) {
    let (writer, receiver) = tokio::sync::mpsc::unbounded_channel();
    let (done_sender, done) = oneshot::channel();
    let flush_every = config.flush_every_events.max(1);
    let flush_interval = config.flush_interval();

    runtime.spawn(async move {
        let mut receiver = receiver;
        let result =
            write_events(sink, &mut receiver, flush_every, flush_interval, &stats).await;

        if let Err(e) = &result {
            log::error!("Failed to write run record, abandoning the run: {e}");
            if let Some(shutdown) = shutdown {
                shutdown.shutdown();
            }
        }

        // Nobody waiting for the result just means the handle was dropped without closing.
        let _ = done_sender.send(result);

        // Producers only start seeing `Closed` once the outcome is known.
        drop(receiver);
    });

    (writer, done)
}

async fn write_events<S: RecordSink>(
    sink: S,
    receiver: &mut UnboundedReceiver<WriterMessage>,
    flush_every: usize,
    flush_interval: std::time::Duration,
    stats: &WriterStats,
) -> WriterResult {
    let mut out = BufWriter::new(sink);
    let mut unflushed = 0usize;
    let mut flush_timer = tokio::time::interval(flush_interval);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let completion = loop {
        select! {
            message = receiver.recv() => {
                match message {
                    Some(WriterMessage::Event(event)) => {
                        stats.queue_depth.fetch_sub(1, Ordering::Relaxed);
                        write_event(&mut out, &event).await?;
                        stats.events_written.fetch_add(1, Ordering::Relaxed);

                        unflushed += 1;
                        if unflushed >= flush_every {
                            out.flush().await?;
                            unflushed = 0;
                        }
                    }
                    Some(WriterMessage::Terminate(completion)) => break completion,
                    None => {
                        log::warn!("Every event producer went away without closing the record, marking the run as interrupted");
                        break RunCompletion::Interrupted;
                    }
                }
            }
            _ = flush_timer.tick() => {
                if unflushed > 0 {
                    log::trace!("Flushing {unflushed} events on timer");
                    out.flush().await?;
                    unflushed = 0;
                }
            }
        }
    };

    write_event(&mut out, &Event::Terminate { completion }).await?;
    out.flush().await?;
    out.get_mut().sync().await?;

    // Anything still queued was submitted after the record was closed.
    receiver.close();
    let mut late_count = 0;
    while let Ok(message) = receiver.try_recv() {
        if let WriterMessage::Event(_) = message {
            stats.queue_depth.fetch_sub(1, Ordering::Relaxed);
            late_count += 1;
        }
    }
    if late_count > 0 {
        log::warn!("Dropped {late_count} events submitted after the record was closed");
    }

    log::debug!(
        "Run record committed with {} events",
        stats.events_written.load(Ordering::Relaxed)
    );

    Ok(completion)
}

#[inline]
async fn write_event<W>(writer: &mut W, event: &Event) -> std::io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    writer.write_all(&line).await
}
