use crate::services::audit::ActivityType;
use crate::services::error::{StorageError, StorageResult};
use crate::services::metadata_store::StoredObject;
use crate::services::range::parse_range;
use crate::services::streaming::{ChunkPacer, ChunkProducer, ChunkSizes, QualityHint};
use crate::utils::validation::{content_type_for, is_media};
use serde_json::json;
use std::io;
use tracing::debug;

use super::{FileService, StreamResponse, StreamStatus};

/// Who may read an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAccess {
    /// Only the owner.
    Owner,
    /// The owner, or anyone when the object is public.
    OwnerOrPublic,
}

impl FileService {
    async fn readable_object(
        &self,
        principal: &str,
        object_id: &str,
        access: ReadAccess,
    ) -> StorageResult<StoredObject> {
        let object = self
            .store
            .find_object(object_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("file {}", object_id)))?;

        let allowed = object.user_id == principal
            || (access == ReadAccess::OwnerOrPublic && object.is_public);
        if !allowed {
            return Err(StorageError::Forbidden);
        }
        Ok(object)
    }

    fn pacer_for(&self, object: &StoredObject, partial: bool, hint: QualityHint) -> ChunkPacer {
        if !partial {
            return ChunkPacer::fixed(self.config.default_chunk_size);
        }
        match hint.pinned() {
            Some(tier) => ChunkPacer::fixed(ChunkSizes::from_config(&self.config).for_tier(tier)),
            None if is_media(&object.display_name) => ChunkPacer::adaptive(&self.config),
            None => ChunkPacer::fixed(self.config.default_chunk_size),
        }
    }

    /// Serves an object whole or as a single byte range.
    ///
    /// Media objects requested in parts with `QualityHint::Auto` adapt their
    /// chunk size to the observed throughput.
    pub async fn serve(
        &self,
        principal: &str,
        object_id: &str,
        range: Option<&str>,
        hint: QualityHint,
        access: ReadAccess,
    ) -> StorageResult<StreamResponse> {
        // Lease first: a record read under the lease keeps its bytes in place
        // until the stream closes, so its location cannot be reused meanwhile.
        let mut lease = self.registry.acquire(object_id)?;
        let object = self.readable_object(principal, object_id, access).await?;

        let (file, total_length) = self.storage.open(&object.location).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(format!("file {}", object_id))
            } else {
                StorageError::StorageIo(e)
            }
        })?;

        let (status, start, length, content_range) = match range {
            None => (StreamStatus::Full, 0, total_length, None),
            Some(expr) => {
                let byte_range =
                    parse_range(expr, total_length, self.config.default_chunk_size as u64)
                        .map_err(|reason| StorageError::InvalidRange {
                            content_length: total_length,
                            reason,
                        })?;
                (
                    StreamStatus::Partial,
                    byte_range.start,
                    byte_range.len(),
                    Some(byte_range.content_range(total_length)),
                )
            }
        };

        let pacer = self.pacer_for(&object, range.is_some(), hint);
        debug!(
            "Serving {} [{}+{}] of {} with {:?}",
            object.location, start, length, total_length, pacer
        );

        lease.touch_on_close();
        let producer = ChunkProducer::new(file, start, length, pacer).with_lease(lease);

        Ok(StreamResponse {
            status,
            content_length: length,
            total_length,
            content_range,
            content_type: content_type_for(&object.display_name),
            display_name: object.display_name,
            producer,
        })
    }

    /// Full download as an attachment, owner only.
    pub async fn download(
        &self,
        principal: &str,
        object_id: &str,
        client_ip: Option<String>,
    ) -> StorageResult<StreamResponse> {
        let response = self
            .serve(principal, object_id, None, QualityHint::Auto, ReadAccess::Owner)
            .await?;

        self.audit.log(
            ActivityType::FileDownload,
            principal,
            json!({
                "file_id": object_id,
                "filename": response.display_name,
                "size": response.total_length,
            }),
            client_ip,
        );
        Ok(response)
    }
}
