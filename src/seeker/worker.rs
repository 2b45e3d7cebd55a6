//! Detail workers and the result sink
//!
//! Workers share one work queue. Each pulls the next id, runs it through the
//! retry policy and hands successful records to the sink, which is the only
//! writer to storage during a run.

use crate::seeker::catalog::CatalogEntry;
use crate::seeker::detail::DetailClient;
use crate::seeker::retry::{RetryOutcome, RetryPolicy};
use crate::seeker::SeekerError;
use crate::storage::{DetailRecord, GameStore};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Shared receiving end of the work queue
pub type WorkQueue = Arc<Mutex<mpsc::Receiver<CatalogEntry>>>;

/// What one worker did before exiting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub index: usize,
    pub fetched: u64,
    pub skipped: u64,
}

/// Sends the worker's report when dropped, so every exit path reports once
struct DoneSignal {
    report: WorkerReport,
    done: mpsc::Sender<WorkerReport>,
}

impl DoneSignal {
    fn new(index: usize, done: mpsc::Sender<WorkerReport>) -> Self {
        Self {
            report: WorkerReport {
                index,
                ..Default::default()
            },
            done,
        }
    }
}

impl Drop for DoneSignal {
    fn drop(&mut self) {
        // The channel holds one slot per worker, so this only fails if the
        // coordinator is gone.
        if self.done.try_send(self.report).is_err() {
            tracing::debug!("Coordinator gone, done signal dropped");
        }
    }
}

/// One detail worker
pub struct Worker {
    index: usize,
    cancel: CancellationToken,
    queue: WorkQueue,
    records: mpsc::Sender<DetailRecord>,
    policy: RetryPolicy,
    detail: DetailClient,
}

impl Worker {
    pub fn new(
        index: usize,
        cancel: CancellationToken,
        queue: WorkQueue,
        records: mpsc::Sender<DetailRecord>,
        policy: RetryPolicy,
        detail: DetailClient,
    ) -> Self {
        Self {
            index,
            cancel,
            queue,
            records,
            policy,
            detail,
        }
    }

    /// Spawns the worker loop inside a `worker{index}` span
    pub fn spawn(self, done: mpsc::Sender<WorkerReport>) -> JoinHandle<()> {
        let span = tracing::info_span!("worker", index = self.index);
        tokio::spawn(self.run(done).instrument(span))
    }

    /// Processes ids until the queue is drained or the run is cancelled
    pub async fn run(self, done: mpsc::Sender<WorkerReport>) {
        let mut signal = DoneSignal::new(self.index, done);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!("Signaled to quit");
                    break;
                }
                next = next_entry(&self.queue) => next,
            };

            let Some(entry) = next else {
                tracing::debug!("Work queue drained");
                break;
            };

            tracing::debug!("Getting app detail: {}", entry.id);
            let outcome = self
                .policy
                .run(&self.cancel, |_| self.detail.fetch(&self.cancel, entry.id))
                .await;

            match outcome {
                RetryOutcome::Success(record) => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            tracing::info!("Signaled to quit");
                            break;
                        }
                        sent = self.records.send(record) => {
                            if sent.is_err() {
                                tracing::warn!("Record sink closed, stopping");
                                break;
                            }
                        }
                    }
                    signal.report.fetched += 1;
                }
                RetryOutcome::Exhausted(err) => {
                    tracing::warn!(
                        "Giving up on {} ({}) after retries: {}",
                        entry.id,
                        entry.name,
                        err
                    );
                    signal.report.skipped += 1;
                }
                RetryOutcome::Skipped(err) => {
                    tracing::warn!("Skipping {} ({}): {}", entry.id, entry.name, err);
                    signal.report.skipped += 1;
                }
                RetryOutcome::Cancelled => {
                    tracing::info!("Signaled to quit");
                    break;
                }
            }
        }
    }
}

async fn next_entry(queue: &WorkQueue) -> Option<CatalogEntry> {
    queue.lock().await.recv().await
}

/// Writes records to storage until every worker has dropped its sender
///
/// Records already queued are flushed before cancellation is honored. A
/// storage failure ends the sink and is fatal to the run.
///
/// # Returns
///
/// * `Ok(u64)` - Number of records saved
/// * `Err(SeekerError::Storage)` - A record could not be written
pub async fn run_sink(
    cancel: CancellationToken,
    platform: &str,
    store: Arc<dyn GameStore>,
    mut records: mpsc::Receiver<DetailRecord>,
) -> Result<u64, SeekerError> {
    let mut saved = 0;

    loop {
        let record = tokio::select! {
            biased;
            received = records.recv() => match received {
                Some(record) => record,
                None => break,
            },
            _ = cancel.cancelled() => {
                tracing::info!("Store record process signaled to quit");
                break;
            }
        };

        let sub_id = record.id.to_string();
        let writer = Arc::clone(&store);
        let (namespace, key) = (platform.to_string(), sub_id.clone());
        let written =
            tokio::task::spawn_blocking(move || writer.save_record(&namespace, &key, &record))
                .await?;
        if let Err(err) = written {
            tracing::error!("Failed to save game record {}: {}", sub_id, err);
            return Err(err.into());
        }
        saved += 1;
    }

    tracing::debug!("Sink finished after {} records", saved);
    Ok(saved)
}
