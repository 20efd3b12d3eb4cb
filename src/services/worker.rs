use crate::services::file_service::FileService;
use crate::services::storage::StorageService;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

pub struct BackgroundWorker {
    file_service: Arc<FileService>,
    storage: Arc<dyn StorageService>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        file_service: Arc<FileService>,
        storage: Arc<dyn StorageService>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            file_service,
            storage,
            interval: Duration::from_secs(3600),
            shutdown,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Background worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.perform_cleanup().await;
                }
            }
        }
    }

    pub async fn perform_cleanup(&self) {
        tracing::info!("🧹 Running background cleanup tasks...");

        // 1. Abandoned staging files
        let max_age =
            Duration::from_secs(self.file_service.config().staging_cleanup_age_hours * 3600);
        match self.storage.sweep_staging(max_age).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Removed {} abandoned staging files", n),
            Err(e) => tracing::error!("Staging sweep failed: {}", e),
        }

        // 2. Idle rate-limit windows and quota locks
        self.file_service.rate_limiter().purge();
        self.file_service.ledger().cleanup_locks();

        tracing::info!("✅ Background cleanup completed");
    }
}
