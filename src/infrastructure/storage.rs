use crate::config::StorageConfig;
use crate::services::storage::{LocalStorageService, StorageService};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageService>> {
    let root = &config.storage_root;
    info!("📦 Storage root: {}", root.display());

    tokio::fs::create_dir_all(config.users_dir()).await?;
    tokio::fs::create_dir_all(config.staging_dir()).await?;

    let storage = LocalStorageService::new(root.clone());
    info!("✅ Storage ready");

    Ok(Arc::new(storage))
}
