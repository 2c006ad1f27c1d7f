//! Background worker that periodically flushes the outbox

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::coordinator::SyncCoordinator;
use crate::storage::KeyValueStore;

/// Handle to the periodic flush task
#[derive(Debug)]
pub struct FlushWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl FlushWorker {
    /// Spawn the flush loop on the current runtime
    ///
    /// The task only holds a weak reference and exits on its own once the
    /// coordinator is dropped.
    pub(crate) fn spawn<S: KeyValueStore>(
        coordinator: Weak<SyncCoordinator<S>>,
        period: Duration,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(coordinator, period, shutdown_rx));
        Self { shutdown, handle }
    }

    /// Signal the loop to stop and wait for it
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!("Flush worker ended abnormally: {}", e);
        }
    }
}

async fn run<S: KeyValueStore>(
    coordinator: Weak<SyncCoordinator<S>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Starting outbox flush worker, period {:?}", period);

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                info!("Flush worker shutting down");
                break;
            }
        }

        let Some(coordinator) = coordinator.upgrade() else {
            debug!("Coordinator dropped, stopping flush worker");
            break;
        };

        // Connectivity is not re-probed here; the next user operation does that
        match coordinator.flush_if_pending().await {
            Ok(Some(report)) => debug!(
                "Periodic flush: {} applied, {} retained",
                report.applied, report.retained
            ),
            Ok(None) => {}
            Err(e) => error!("Periodic flush failed: {}", e),
        }
    }
}
