//! Driver spawns and manages the capture worker

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::dispatcher::Dispatcher;
use crate::source::CaptureSource;
use crate::types::DispatchEvent;

/// Consecutive source errors tolerated before the worker gives up.
pub const MAX_SOURCE_ERRORS: u32 = 10;

/// Counters maintained by the capture worker.
#[derive(Debug, Default)]
pub struct DriverStats {
    records: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
    source_errors: AtomicU64,
}

impl DriverStats {
    /// Records read from the source.
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    /// Messages completed and stored.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Records dropped because they failed to decode or store.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Errors reported by the source, in total.
    pub fn source_errors(&self) -> u64 {
        self.source_errors.load(Ordering::Relaxed)
    }

    /// Copy the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records: self.records(),
            dispatched: self.dispatched(),
            dropped: self.dropped(),
            source_errors: self.source_errors(),
        }
    }
}

/// Point-in-time copy of [`DriverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub records: u64,
    pub dispatched: u64,
    pub dropped: u64,
    pub source_errors: u64,
}

/// Result of spawning the capture worker
pub struct DriverHandle {
    /// Last dispatched message; `None` before the first one and after the capture ended
    pub events: watch::Receiver<Option<Arc<DispatchEvent>>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Live counters
    pub stats: Arc<DriverStats>,
    /// The worker task; resolves once the capture loop has exited
    pub task: JoinHandle<()>,
}

impl DriverHandle {
    /// Whether the worker is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Request a stop and wait for the worker to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Capture worker did not exit cleanly: {}", e);
        }
    }
}

/// Driver spawns and manages the capture worker
///
/// The worker owns the [`CaptureSource`] and the [`Dispatcher`]; it is the only
/// writer of the message store.
pub struct Driver;

impl Driver {
    /// Spawn the capture worker for the given source.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S>(source: S, dispatcher: Dispatcher) -> DriverHandle
    where
        S: CaptureSource,
    {
        let (event_tx, event_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let stats = Arc::new(DriverStats::default());

        let task = tokio::spawn(Self::capture_task(
            source,
            dispatcher,
            event_tx,
            cancel.clone(),
            Arc::clone(&stats),
        ));

        DriverHandle { events: event_rx, cancel, stats, task }
    }

    /// Capture worker - reads records and dispatches them until stopped
    async fn capture_task<S>(
        mut source: S,
        mut dispatcher: Dispatcher,
        event_tx: watch::Sender<Option<Arc<DispatchEvent>>>,
        cancel: CancellationToken,
        stats: Arc<DriverStats>,
    ) where
        S: CaptureSource,
    {
        info!("Capture worker started on {}", source.describe());
        let mut error_count = 0u32;

        loop {
            // Checked between records so a stop never interrupts a dispatch
            if cancel.is_cancelled() {
                info!("Capture worker cancelled");
                break;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Capture worker cancelled during read");
                    break;
                }
                result = source.next_record() => result,
            };

            match result {
                Ok(Some(record)) => {
                    error_count = 0;
                    stats.records.fetch_add(1, Ordering::Relaxed);

                    match dispatcher.dispatch(&record) {
                        Ok(Some(event)) => {
                            stats.dispatched.fetch_add(1, Ordering::Relaxed);
                            trace!(service = %event.service, id = event.id, "Dispatched");
                            // Storing continues even when nobody watches the events
                            event_tx.send_replace(Some(Arc::new(event)));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            stats.dropped.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                port = record.port,
                                len = record.payload.len(),
                                "Dropping record: {}",
                                e
                            );
                        }
                    }
                }
                Ok(None) => {
                    info!("Capture ended after {} records", stats.records());
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    stats.source_errors.fetch_add(1, Ordering::Relaxed);
                    error!("Capture source error ({}/{}): {}", error_count, MAX_SOURCE_ERRORS, e);

                    if error_count >= MAX_SOURCE_ERRORS || !e.is_retryable() {
                        error!("Capture source failed, shutting down");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ... capped at 1.6s
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Capture worker cancelled during backoff");
                            break;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        if dispatcher.in_flight() > 0 {
            debug!("Discarding {} partial messages", dispatcher.in_flight());
        }
        dispatcher.discard_partials();
        event_tx.send_replace(None);

        info!(
            records = stats.records(),
            dispatched = stats.dispatched(),
            dropped = stats.dropped(),
            "Capture worker ended"
        );
    }
}
