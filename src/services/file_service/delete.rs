use crate::services::audit::ActivityType;
use crate::services::error::{StorageError, StorageResult};
use serde_json::json;
use tracing::{info, warn};

use super::FileService;

impl FileService {
    /// Deletes an owned object and releases its quota.
    ///
    /// Only the call that actually removes the record releases quota, so a
    /// repeated delete reports not-found and never double-decrements.
    pub async fn delete_object(
        &self,
        principal: &str,
        object_id: &str,
        client_ip: Option<String>,
    ) -> StorageResult<()> {
        let object = self
            .store
            .find_object(object_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("file {}", object_id)))?;

        if object.user_id != principal {
            warn!("{} attempted to delete {} owned by {}", principal, object_id, object.user_id);
            return Err(StorageError::Forbidden);
        }

        // Dropping the guard on any early return re-opens the object.
        let guard = self
            .registry
            .begin_delete(object_id, self.config.delete_policy)?;

        let size = object.size.max(0) as u64;

        // Record and quota go together; on failure the guard re-opens the
        // object and the bytes stay in place for a retry.
        if !self.ledger.release_object(principal, object_id, size).await? {
            return Err(StorageError::NotFound(format!("file {}", object_id)));
        }

        if guard.commit(&object.location) {
            if let Err(e) = self.storage.remove(&object.location).await {
                warn!("Record {} deleted but file removal failed: {}", object_id, e);
            }
        }

        self.audit.log(
            ActivityType::FileDelete,
            principal,
            json!({
                "file_id": object.id,
                "filename": object.display_name,
                "size": object.size,
            }),
            client_ip,
        );

        info!("🗑️  Deleted {} ({} bytes) for {}", object.location, size, principal);
        Ok(())
    }
}
