//! Background flush and integrity task.

use std::sync::Weak;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::logger::SecureAuditLogger;
use pqbridge_common::{Error, Result};

/// Owns the logger's maintenance task.
///
/// Call [`MaintenanceHandle::shutdown`] for a graceful stop with a final
/// flush. Dropping the handle aborts the task instead.
#[derive(Debug)]
pub struct MaintenanceHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    pub(crate) fn spawn(
        logger: Weak<SecureAuditLogger>,
        flush_every: Duration,
        check_every: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(logger, flush_every, check_every, shutdown_rx));
        Self {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the task, flush once more, and wait for it to finish.
    ///
    /// # Errors
    /// - `NotRunning` if the task had already panicked or been cancelled
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| Error::NotRunning(format!("Audit maintenance task failed: {}", e))),
            None => Ok(()),
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    logger: Weak<SecureAuditLogger>,
    flush_every: Duration,
    check_every: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let start = Instant::now();
    let mut flush_tick = interval_at(start + flush_every, flush_every);
    let mut check_tick = interval_at(start + check_every, check_every);
    flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    check_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Audit maintenance started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Some(logger) = logger.upgrade() {
                    if let Err(e) = logger.flush_now().await {
                        warn!("Final audit flush failed: {}", e);
                    }
                }
                info!("Audit maintenance stopped");
                break;
            }

            _ = flush_tick.tick() => {
                let Some(logger) = logger.upgrade() else {
                    debug!("Audit logger dropped, maintenance exiting");
                    break;
                };
                // Failures are already reported and requeued by the logger.
                let _ = logger.flush_now().await;
            }

            _ = check_tick.tick() => {
                let Some(logger) = logger.upgrade() else {
                    debug!("Audit logger dropped, maintenance exiting");
                    break;
                };
                logger.verify_integrity();
            }
        }
    }
}
