//! Background refresh for results served from the local store.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{debug, info, warn};

use super::fetcher::UpstreamFetcher;
use super::SearchError;
use crate::cache::TtlCache;
use crate::config::SearchConfig;
use crate::metrics;

/// Work re-running the miss path for something already served from the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefreshJob {
    Search(String),
    Detail { source_key: String, vod_id: String },
}

impl fmt::Display for RefreshJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshJob::Search(keyword) => write!(f, "search:{}", keyword),
            RefreshJob::Detail { source_key, vod_id } => {
                write!(f, "detail:{}:{}", source_key, vod_id)
            }
        }
    }
}

/// Bounded job queue drained by a fixed number of workers.
///
/// Jobs are fire-and-forget: failures are logged and counted, never retried.
/// A job accepted within the cooldown window is not accepted again until the
/// window passes.
pub struct RefreshQueue {
    fetcher: Arc<UpstreamFetcher>,
    tx: mpsc::Sender<RefreshJob>,
    rx: Mutex<Option<mpsc::Receiver<RefreshJob>>>,
    workers: usize,
    job_timeout: Duration,
    cooldown: Mutex<TtlCache<RefreshJob, ()>>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RefreshQueue {
    pub fn new(fetcher: Arc<UpstreamFetcher>, config: &SearchConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.refresh_queue_size.max(1));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            fetcher,
            tx,
            rx: Mutex::new(Some(rx)),
            workers: config.refresh_workers.max(1),
            job_timeout: config.refresh_timeout(),
            cooldown: Mutex::new(TtlCache::new(
                config.refresh_cooldown_capacity,
                config.refresh_cooldown(),
            )),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Queue a job without waiting. Returns false if the job is cooling down
    /// or the queue is full.
    pub fn enqueue(&self, job: RefreshJob) -> bool {
        let mut cooldown = self.cooldown();
        if cooldown.contains(&job) {
            metrics::REFRESH_JOBS.with_label_values(&["cooldown"]).inc();
            debug!(job = %job, "Refresh skipped, recently queued");
            return false;
        }

        match self.tx.try_send(job.clone()) {
            Ok(()) => {
                cooldown.insert(job, ());
                metrics::REFRESH_JOBS.with_label_values(&["queued"]).inc();
                true
            }
            Err(TrySendError::Full(job)) => {
                metrics::REFRESH_JOBS.with_label_values(&["dropped"]).inc();
                warn!(job = %job, "Refresh queue full, dropping job");
                false
            }
            Err(TrySendError::Closed(job)) => {
                metrics::REFRESH_JOBS.with_label_values(&["dropped"]).inc();
                debug!(job = %job, "Refresh queue stopped, dropping job");
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Jobs waiting for a worker.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Start draining the queue. The queue cannot be restarted once stopped.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Refresh queue already running");
            return;
        }

        let rx = match self.rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(rx) = rx else {
            warn!("Refresh queue was stopped and cannot be restarted");
            self.running.store(false, Ordering::SeqCst);
            return;
        };

        info!(
            workers = self.workers,
            timeout_secs = self.job_timeout.as_secs(),
            "Starting refresh queue"
        );

        self.spawn_dispatcher(rx);
    }

    /// Stop accepting work. Queued jobs are discarded and workers stop
    /// waiting on running jobs; an upstream fetch that has already started
    /// runs to completion on its own task and still persists its results.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Refresh queue not running");
            return;
        }

        info!("Stopping refresh queue");

        let _ = self.shutdown_tx.send(());

        // Let the dispatcher observe the signal and drop the receiver
        tokio::time::sleep(Duration::from_millis(200)).await;

        info!("Refresh queue stopped");
    }

    fn spawn_dispatcher(&self, mut rx: mpsc::Receiver<RefreshJob>) {
        let fetcher = Arc::clone(&self.fetcher);
        let permits = Arc::new(Semaphore::new(self.workers));
        let job_timeout = self.job_timeout;
        let shutdown_tx = self.shutdown_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Refresh dispatcher started");
            loop {
                let job = tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Refresh dispatcher received shutdown signal");
                        break;
                    }
                    job = rx.recv() => match job {
                        Some(job) => job,
                        None => break,
                    },
                };

                let permit = tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Refresh dispatcher received shutdown signal");
                        break;
                    }
                    permit = Arc::clone(&permits).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let fetcher = Arc::clone(&fetcher);
                let mut job_shutdown = shutdown_tx.subscribe();

                tokio::spawn(async move {
                    let _permit = permit;
                    tokio::select! {
                        _ = job_shutdown.recv() => {
                            debug!(job = %job, "Stopped waiting on refresh job");
                        }
                        result = tokio::time::timeout(job_timeout, run_job(&fetcher, &job)) => {
                            match result {
                                Ok(Ok(())) => {
                                    metrics::REFRESH_JOBS.with_label_values(&["completed"]).inc();
                                    debug!(job = %job, "Refresh job completed");
                                }
                                Ok(Err(e)) => {
                                    metrics::REFRESH_JOBS.with_label_values(&["failed"]).inc();
                                    warn!(job = %job, error = %e, "Refresh job failed");
                                }
                                Err(_) => {
                                    metrics::REFRESH_JOBS.with_label_values(&["failed"]).inc();
                                    warn!(
                                        job = %job,
                                        timeout_secs = job_timeout.as_secs(),
                                        "Refresh job timed out"
                                    );
                                }
                            }
                        }
                    }
                });
            }
            info!("Refresh dispatcher stopped");
        });
    }

    fn cooldown(&self) -> MutexGuard<'_, TtlCache<RefreshJob, ()>> {
        match self.cooldown.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

async fn run_job(fetcher: &Arc<UpstreamFetcher>, job: &RefreshJob) -> Result<(), SearchError> {
    match job {
        RefreshJob::Search(keyword) => fetcher.search(keyword).await.result.map(|_| ()),
        RefreshJob::Detail { source_key, vod_id } => {
            fetcher.detail(source_key, vod_id).await.result.map(|_| ())
        }
    }
}
