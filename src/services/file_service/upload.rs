use crate::entities::tags::FOLDER_TAG;
use crate::services::audit::ActivityType;
use crate::services::error::{StorageError, StorageResult};
use crate::services::metadata_store::{StoredObject, TagRequest};
use crate::services::naming;
use crate::services::storage::{PromoteError, StagingEntry};
use crate::utils::validation::{
    categorize, extension_of, is_archive, is_known_category, sanitize_filename,
};
use chrono::Utc;
use serde_json::json;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{CommittedUpload, FileService, StagedUpload, UploadRequest};

impl FileService {
    /// Counts an upload attempt against the principal's hourly allowance.
    pub fn admit_upload(&self, principal: &str) -> StorageResult<()> {
        self.rate_limiter.check(principal).inspect_err(|_| {
            warn!("Upload rate limit hit for {}", principal);
        })
    }

    /// Sanitizes the client filename and rejects blocked types before any
    /// byte is staged.
    pub fn prepare_name(&self, filename: &str) -> StorageResult<String> {
        let name = sanitize_filename(filename)
            .map_err(|e| StorageError::InvalidInput(e.message))?;

        if let Some(ext) = extension_of(&name) {
            if self.config.is_blocked_extension(&ext) {
                warn!("Rejected upload of blocked type .{}: {}", ext, name);
                return Err(StorageError::DisallowedType { extension: ext });
            }
        }
        Ok(name)
    }

    pub async fn upload_to_staging<'a>(
        &self,
        principal: &str,
        display_name: &str,
        reader: impl AsyncRead + Unpin + Send + 'a,
    ) -> StorageResult<StagedUpload> {
        let entry = self
            .storage
            .stage(principal, Box::new(reader), self.config.max_file_size as u64)
            .await?;

        info!(
            "Staged {} bytes for {} ({})",
            entry.size(),
            display_name,
            principal
        );

        Ok(StagedUpload {
            entry,
            display_name: display_name.to_string(),
        })
    }

    /// Accounts, places and records a staged upload.
    ///
    /// The commit runs as its own task so a client disconnect cannot stop it
    /// between reservation and rollback.
    pub async fn process_upload(
        self: &Arc<Self>,
        staged: StagedUpload,
        request: UploadRequest,
    ) -> StorageResult<CommittedUpload> {
        let category = match request.category.as_deref().map(str::trim) {
            None | Some("") => categorize(&staged.display_name).to_string(),
            Some(c) if is_known_category(&c.to_lowercase()) => c.to_lowercase(),
            Some(c) => {
                return Err(StorageError::InvalidInput(format!("unknown category: {}", c)));
            }
        };

        let this = Arc::clone(self);
        tokio::spawn(async move { this.commit(staged, request, category).await })
            .await
            .map_err(|e| StorageError::StorageIo(io::Error::other(e)))?
    }

    /// Stages and commits in one call.
    pub async fn ingest<'a>(
        self: &Arc<Self>,
        request: UploadRequest,
        desired_name: &str,
        reader: impl AsyncRead + Unpin + Send + 'a,
    ) -> StorageResult<CommittedUpload> {
        let name = self.prepare_name(desired_name)?;
        let staged = self
            .upload_to_staging(&request.principal, &name, reader)
            .await?;
        self.process_upload(staged, request).await
    }

    async fn commit(
        &self,
        staged: StagedUpload,
        request: UploadRequest,
        category: String,
    ) -> StorageResult<CommittedUpload> {
        let StagedUpload {
            entry,
            display_name,
        } = staged;
        let principal = request.principal.as_str();
        let size = entry.size();
        let size_i64 = i64::try_from(size)
            .map_err(|_| StorageError::InvalidInput("object too large".to_string()))?;

        // Dropping `entry` on rejection removes the staged bytes.
        self.ledger.reserve(principal, size).await?;

        let (storage_name, location) = match self.place(entry, principal, &display_name).await {
            Ok(placed) => placed,
            Err(e) => {
                error!("Failed to place upload {} for {}: {}", display_name, principal, e);
                self.rollback_reservation(principal, size).await;
                return Err(e);
            }
        };

        let object = StoredObject {
            id: Uuid::new_v4().to_string(),
            user_id: principal.to_string(),
            display_name: display_name.clone(),
            storage_name,
            size: size_i64,
            category,
            location,
            is_public: false,
            created_at: Utc::now(),
            last_accessed: None,
        };

        let tags = TagRequest {
            requested: request.tag_ids.clone(),
            system: if is_archive(&display_name) {
                vec![FOLDER_TAG]
            } else {
                Vec::new()
            },
        };

        let tag_ids = match self.store.insert_object(object.clone(), tags).await {
            Ok(tag_ids) => tag_ids,
            Err(e) => {
                error!("Failed to record {} for {}: {}", object.location, principal, e);
                if let Err(remove_err) = self.storage.remove(&object.location).await {
                    error!("Failed to remove orphan {}: {}", object.location, remove_err);
                }
                self.rollback_reservation(principal, size).await;
                return Err(e.into());
            }
        };

        self.audit.log(
            ActivityType::FileUpload,
            principal,
            json!({
                "file_id": object.id,
                "filename": object.display_name,
                "storage_name": object.storage_name,
                "size": object.size,
            }),
            request.client_ip,
        );

        info!(
            "✅ Stored {} as {} ({} bytes) for {}",
            object.display_name, object.location, size, principal
        );

        Ok(CommittedUpload { object, tag_ids })
    }

    /// Resolves a free name and renames the entry into place without ever
    /// replacing an existing file, retrying when the name is taken meanwhile.
    async fn place(
        &self,
        mut entry: StagingEntry,
        principal: &str,
        desired: &str,
    ) -> StorageResult<(String, String)> {
        let dir = self.storage.principal_dir(principal)?;

        for attempt in 1..=self.config.name_resolve_attempts {
            let name = naming::resolve(&dir, desired).await?;
            match self.storage.promote(entry, principal, &name).await {
                Ok(location) => return Ok((name, location)),
                Err(PromoteError::Collision(returned)) => {
                    warn!(
                        "Name {} taken during promotion (attempt {}/{})",
                        name, attempt, self.config.name_resolve_attempts
                    );
                    entry = returned;
                }
                Err(PromoteError::Io(e)) => return Err(e.into()),
            }
        }

        Err(StorageError::StorageIo(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free name for {} after retries", desired),
        )))
    }

    async fn rollback_reservation(&self, principal: &str, size: u64) {
        if let Err(e) = self.ledger.release(principal, size).await {
            error!(
                "Failed to roll back {} byte reservation for {}: {}",
                size, principal, e
            );
        }
    }
}
