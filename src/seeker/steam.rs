//! Steam seeker lifecycle
//!
//! [`SteamSeeker::start`] refreshes the catalog and launches the sink and the
//! workers. [`SteamSeeker::wait_until_done`] then fans in the worker reports,
//! honoring cancellation with a bounded grace period.

use crate::config::SteamConfig;
use crate::seeker::catalog::{refresh_catalog, seed_queue, PATH_GET_APP_LIST};
use crate::seeker::detail::DetailClient;
use crate::seeker::http::build_http_client;
use crate::seeker::retry::RetryPolicy;
use crate::seeker::worker::{run_sink, Worker, WorkerReport};
use crate::seeker::SeekerError;
use crate::storage::GameStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Storage namespace of this seeker
pub const PLATFORM: &str = "steam";

/// Lifecycle states of a seeker run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekerState {
    Initializing,
    ListFetched,
    Running,
    Draining,
    Done,
    TimedOut,
    Failed,
}

impl fmt::Display for SeekerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeekerState::Initializing => "initializing",
            SeekerState::ListFetched => "list-fetched",
            SeekerState::Running => "running",
            SeekerState::Draining => "draining",
            SeekerState::Done => "done",
            SeekerState::TimedOut => "timed-out",
            SeekerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Aggregate outcome of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekSummary {
    /// Ids placed on the work queue
    pub seeded: usize,
    /// Records handed to the sink
    pub fetched: u64,
    /// Ids abandoned after retries or a fatal parse failure
    pub skipped: u64,
    /// Records written by the sink
    pub saved: u64,
    /// Workers that reported completion
    pub workers_finished: usize,
}

/// A running Steam seeker
pub struct SteamSeeker {
    cancel: CancellationToken,
    state: SeekerState,
    grace_period: Duration,
    workers: usize,
    done_rx: mpsc::Receiver<WorkerReport>,
    sink: JoinHandle<Result<u64, SeekerError>>,
    sink_saved: Option<u64>,
    summary: SeekSummary,
}

impl SteamSeeker {
    /// Refreshes the catalog and starts the sink and workers
    ///
    /// Returns once every task is spawned; the catalog fetch itself is the
    /// only part awaited here.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Cancellation signal of the run; the seeker derives a child
    /// * `config` - Steam configuration
    /// * `store` - Storage collaborator
    ///
    /// # Returns
    ///
    /// * `Ok(SteamSeeker)` - Seeker in the `Running` state
    /// * `Err(SeekerError)` - Catalog fetch, parse or persistence failed
    pub async fn start(
        cancel: &CancellationToken,
        config: SteamConfig,
        store: Arc<dyn GameStore>,
    ) -> Result<Self, SeekerError> {
        let span = tracing::info_span!("seeker", platform = PLATFORM);
        Self::launch(cancel.child_token(), config, store)
            .instrument(span)
            .await
    }

    async fn launch(
        cancel: CancellationToken,
        config: SteamConfig,
        store: Arc<dyn GameStore>,
    ) -> Result<Self, SeekerError> {
        tracing::info!("State: {}", SeekerState::Initializing);

        let client = build_http_client().map_err(SeekerError::Client)?;
        let request = client
            .get(format!(
                "{}{}",
                config.portal.trim_end_matches('/'),
                PATH_GET_APP_LIST
            ))
            .query(&[("key", config.key.as_str())])
            .build()
            .map_err(SeekerError::Client)?;

        let diff = match refresh_catalog(&cancel, &client, request, &store, PLATFORM).await {
            Ok(diff) => diff,
            Err(err) => {
                tracing::error!(
                    "State: {} -> {}: {}",
                    SeekerState::Initializing,
                    SeekerState::Failed,
                    err
                );
                cancel.cancel();
                return Err(err);
            }
        };
        tracing::info!(
            "State: {} -> {}, {} new titles",
            SeekerState::Initializing,
            SeekerState::ListFetched,
            diff.len()
        );

        let workers = config.worker.max(1);
        let seeded = diff.len();

        let (queue_tx, queue_rx) = mpsc::channel(workers);
        let (records_tx, records_rx) = mpsc::channel(workers);
        let (done_tx, done_rx) = mpsc::channel(workers);

        seed_queue(cancel.clone(), diff.into_entries(), queue_tx);

        let sink = tokio::spawn(
            run_sink(cancel.clone(), PLATFORM, store, records_rx)
                .instrument(tracing::info_span!("sink", platform = PLATFORM)),
        );

        let queue = Arc::new(Mutex::new(queue_rx));
        let detail = DetailClient::new(client, &config.store_portal);
        let policy = RetryPolicy::new(config.retry_count, config.retry_interval);
        for index in 0..workers {
            Worker::new(
                index,
                cancel.clone(),
                queue.clone(),
                records_tx.clone(),
                policy,
                detail.clone(),
            )
            .spawn(done_tx.clone());
        }

        tracing::info!(
            "State: {} -> {}, {} workers",
            SeekerState::ListFetched,
            SeekerState::Running,
            workers
        );

        Ok(Self {
            cancel,
            state: SeekerState::Running,
            grace_period: config.grace_period,
            workers,
            done_rx,
            sink,
            sink_saved: None,
            summary: SeekSummary {
                seeded,
                ..Default::default()
            },
        })
    }

    pub fn state(&self) -> SeekerState {
        self.state
    }

    /// Waits for every worker to finish and the sink to flush
    ///
    /// # Returns
    ///
    /// * `Ok(SeekSummary)` - Run reached `Done`, normally or after a drain
    /// * `Err(SeekerError::Storage)` - The sink failed to persist a record
    /// * `Err(SeekerError::QuitTimeout)` - Workers did not drain within the grace period
    pub async fn wait_until_done(self) -> Result<SeekSummary, SeekerError> {
        let span = tracing::info_span!("seeker", platform = PLATFORM);
        self.wait().instrument(span).await
    }

    async fn wait(mut self) -> Result<SeekSummary, SeekerError> {
        while self.summary.workers_finished < self.workers {
            tokio::select! {
                biased;
                joined = &mut self.sink, if self.sink_saved.is_none() => {
                    match joined.map_err(SeekerError::from).and_then(|saved| saved) {
                        Ok(saved) => self.sink_saved = Some(saved),
                        Err(err) => return Err(self.fail(err)),
                    }
                }
                report = self.done_rx.recv() => match report {
                    Some(report) => self.absorb(report),
                    None => break,
                },
                _ = self.cancel.cancelled() => return self.drain().await,
            }
        }

        // Workers are done but the sink may still be writing; an interrupt
        // here gets the same bounded drain as one during Running.
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            flushed = self.flush_sink() => match flushed {
                Ok(saved) => Ok(self.finish(saved)),
                Err(err) => Err(self.fail(err)),
            },
            _ = cancel.cancelled() => self.drain().await,
        }
    }

    async fn drain(mut self) -> Result<SeekSummary, SeekerError> {
        self.transition(SeekerState::Draining);

        let grace_period = self.grace_period;
        let outcome = tokio::time::timeout(grace_period, self.collect_remaining()).await;
        match outcome {
            Ok(Ok(saved)) => Ok(self.finish(saved)),
            Ok(Err(err)) => Err(self.fail(err)),
            Err(_) => {
                self.transition(SeekerState::TimedOut);
                tracing::warn!(
                    "Only {}/{} workers quit within {:?}",
                    self.summary.workers_finished,
                    self.workers,
                    self.grace_period
                );
                Err(SeekerError::QuitTimeout {
                    platform: PLATFORM.to_string(),
                    finished: self.summary.workers_finished,
                    total: self.workers,
                })
            }
        }
    }

    async fn collect_remaining(&mut self) -> Result<u64, SeekerError> {
        while self.summary.workers_finished < self.workers {
            match self.done_rx.recv().await {
                Some(report) => self.absorb(report),
                None => break,
            }
        }
        self.flush_sink().await
    }

    async fn flush_sink(&mut self) -> Result<u64, SeekerError> {
        if let Some(saved) = self.sink_saved {
            return Ok(saved);
        }
        let saved = (&mut self.sink).await??;
        self.sink_saved = Some(saved);
        Ok(saved)
    }

    fn absorb(&mut self, report: WorkerReport) {
        tracing::debug!(
            "Worker {} finished: {} fetched, {} skipped",
            report.index,
            report.fetched,
            report.skipped
        );
        self.summary.workers_finished += 1;
        self.summary.fetched += report.fetched;
        self.summary.skipped += report.skipped;
    }

    fn finish(&mut self, saved: u64) -> SeekSummary {
        self.summary.saved = saved;
        self.transition(SeekerState::Done);
        self.summary
    }

    fn fail(&mut self, err: SeekerError) -> SeekerError {
        tracing::error!("Seeker failed: {}", err);
        self.transition(SeekerState::Failed);
        self.cancel.cancel();
        err
    }

    fn transition(&mut self, next: SeekerState) {
        tracing::info!("State: {} -> {}", self.state, next);
        self.state = next;
    }
}
