use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use crate::services::file_store::FileStore;

/// Interval between sweeps
const SWEEP_INTERVAL_SECS: u64 = 3600;

/// Periodic janitor for the blob store. Staged uploads normally delete
/// themselves, but a crash mid-upload can leave files behind in the
/// staging directory; this worker removes them once they are old enough
/// to be certainly dead.
pub struct BackgroundSweeper {
    store: Arc<FileStore>,
    staging_max_age: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundSweeper {
    pub fn new(
        store: Arc<FileStore>,
        staging_max_age: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            staging_max_age,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Background sweeper started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background sweeper shutting down");
                    break;
                }
                _ = sleep(Duration::from_secs(SWEEP_INTERVAL_SECS)) => {
                    self.perform_sweep().await;
                }
            }
        }
    }

    async fn perform_sweep(&self) {
        tracing::info!("🧹 Sweeping abandoned staging files...");

        match self.store.sweep_staging(self.staging_max_age).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Removed {} abandoned staging file(s)", n),
            Err(e) => tracing::error!("Staging sweep failed: {}", e),
        }

        self.store.cleanup_locks();
    }
}
