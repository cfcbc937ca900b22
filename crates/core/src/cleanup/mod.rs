//! Retention sweeper: deletes items nobody has visited for a while.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::RetentionConfig;
use crate::item::{ItemStore, ItemStoreError};
use crate::metrics;

const MIN_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Periodically runs `delete_inactive` against the item store.
///
/// The first sweep runs as soon as the sweeper starts.
pub struct RetentionSweeper {
    store: Arc<dyn ItemStore>,
    inactive_days: u32,
    interval: Duration,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn ItemStore>, config: &RetentionConfig) -> Self {
        Self::with_interval(store, config.inactive_days, config.sweep_interval())
    }

    /// The interval is clamped to between one second and a year.
    pub fn with_interval(store: Arc<dyn ItemStore>, inactive_days: u32, interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            store,
            inactive_days,
            interval: interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Run one sweep now.
    pub fn sweep_once(&self) -> Result<usize, ItemStoreError> {
        sweep(self.store.as_ref(), self.inactive_days)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Retention sweeper already running");
            return;
        }

        info!(
            inactive_days = self.inactive_days,
            interval_secs = self.interval.as_secs(),
            "Starting retention sweeper"
        );

        let store = Arc::clone(&self.store);
        let running = Arc::clone(&self.running);
        let inactive_days = self.inactive_days;
        let interval = self.interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Retention sweeper received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = sweep(store.as_ref(), inactive_days) {
                            error!(error = %e, "Retention sweep failed");
                        }
                    }
                }
            }
            info!("Retention sweeper stopped");
        });
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Retention sweeper not running");
            return;
        }

        let _ = self.shutdown_tx.send(());
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn sweep(store: &dyn ItemStore, inactive_days: u32) -> Result<usize, ItemStoreError> {
    let deleted = store.delete_inactive(inactive_days)?;
    metrics::RETENTION_DELETIONS.inc_by(deleted as u64);
    info!(deleted, inactive_days, "Retention sweep complete");
    Ok(deleted)
}
