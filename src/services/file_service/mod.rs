use crate::config::StorageConfig;
use crate::services::error::StorageResult;
use crate::services::{
    audit::AuditService,
    metadata_store::{MetadataStore, SeaOrmMetadataStore},
    quota::QuotaLedger,
    rate_limit::UploadRateLimiter,
    storage::StorageService,
    stream_registry::StreamRegistry,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod delete;
pub mod stream;
pub mod types;
pub mod upload;

pub use types::{CommittedUpload, StagedUpload, StreamResponse, StreamStatus, UploadRequest};

/// Admission and delivery of stored objects.
///
/// Reads and writes go through the metadata store and the quota ledger held
/// here, never around them.
pub struct FileService {
    store: Arc<dyn MetadataStore>,
    storage: Arc<dyn StorageService>,
    ledger: QuotaLedger,
    registry: StreamRegistry,
    rate_limiter: UploadRateLimiter,
    audit: AuditService,
    config: StorageConfig,
}

impl FileService {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        config: StorageConfig,
    ) -> Self {
        let store: Arc<dyn MetadataStore> = Arc::new(SeaOrmMetadataStore::new(db.clone()));
        Self::with_store(db, store, storage, config)
    }

    /// Builds the service over an explicit metadata store.
    pub fn with_store(
        db: DatabaseConnection,
        store: Arc<dyn MetadataStore>,
        storage: Arc<dyn StorageService>,
        config: StorageConfig,
    ) -> Self {
        Self {
            ledger: QuotaLedger::new(store.clone(), &config),
            registry: StreamRegistry::new(storage.clone(), store.clone()),
            rate_limiter: UploadRateLimiter::per_hour(config.uploads_per_hour),
            audit: AuditService::new(db),
            store,
            storage,
            config,
        }
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn rate_limiter(&self) -> &UploadRateLimiter {
        &self.rate_limiter
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Whether the principal has a quota record, i.e. may own objects.
    pub async fn principal_exists(&self, principal: &str) -> StorageResult<bool> {
        Ok(self.store.quota(principal).await?.is_some())
    }

    /// Reachability of the metadata store and the storage root.
    pub async fn health(&self) -> (bool, bool) {
        let metadata = self.store.ping().await.is_ok();
        let storage = self.storage.health().await;
        (metadata, storage)
    }
}
