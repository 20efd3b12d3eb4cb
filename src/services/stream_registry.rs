use crate::config::DeletePolicy;
use crate::services::error::{StorageError, StorageResult};
use crate::services::metadata_store::MetadataStore;
use crate::services::storage::StorageService;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Entry {
    active: usize,
    deleting: bool,
    /// Set once the record is gone but producers still hold the bytes.
    pending_removal: Option<String>,
}

/// Tracks live stream producers per object so deletion never unlinks bytes
/// that are still being served.
#[derive(Clone)]
pub struct StreamRegistry {
    entries: Arc<DashMap<String, Entry>>,
    storage: Arc<dyn StorageService>,
    store: Arc<dyn MetadataStore>,
}

impl StreamRegistry {
    pub fn new(storage: Arc<dyn StorageService>, store: Arc<dyn MetadataStore>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            storage,
            store,
        }
    }

    /// Registers a new producer for `object_id`. Fails with `NotFound` while a
    /// delete of the object is in progress or deferred.
    pub fn acquire(&self, object_id: &str) -> StorageResult<StreamLease> {
        let mut entry = self.entries.entry(object_id.to_string()).or_default();
        if entry.deleting {
            return Err(StorageError::NotFound(format!("object {}", object_id)));
        }
        entry.active += 1;
        debug!("Stream opened on {} ({} active)", object_id, entry.active);

        Ok(StreamLease {
            registry: self.clone(),
            object_id: object_id.to_string(),
            touch_on_close: false,
        })
    }

    pub fn active_streams(&self, object_id: &str) -> usize {
        self.entries.get(object_id).map(|e| e.active).unwrap_or(0)
    }

    /// Marks `object_id` as being deleted. New streams are refused until the
    /// returned guard is committed or dropped.
    pub fn begin_delete(
        &self,
        object_id: &str,
        policy: DeletePolicy,
    ) -> StorageResult<DeleteGuard<'_>> {
        let mut entry = self.entries.entry(object_id.to_string()).or_default();
        if entry.deleting {
            return Err(StorageError::NotFound(format!("object {}", object_id)));
        }
        if policy == DeletePolicy::Reject && entry.active > 0 {
            return Err(StorageError::ResourceBusy(object_id.to_string()));
        }
        entry.deleting = true;

        Ok(DeleteGuard {
            registry: self,
            object_id: object_id.to_string(),
            finished: false,
        })
    }

    fn commit_delete(&self, object_id: &str, location: &str) -> bool {
        let remove_now = match self.entries.get_mut(object_id) {
            Some(mut entry) if entry.active > 0 => {
                entry.pending_removal = Some(location.to_string());
                info!(
                    "Deferring removal of {} until {} stream(s) close",
                    object_id, entry.active
                );
                false
            }
            _ => true,
        };

        if remove_now {
            self.entries
                .remove_if(object_id, |_, entry| entry.active == 0);
        }
        remove_now
    }

    fn abort_delete(&self, object_id: &str) {
        if let Some(mut entry) = self.entries.get_mut(object_id) {
            entry.deleting = false;
        }
        self.entries
            .remove_if(object_id, |_, entry| entry.active == 0 && !entry.deleting);
    }

    fn release(&self, object_id: &str) -> Option<String> {
        let pending = {
            let mut entry = self.entries.get_mut(object_id)?;
            entry.active = entry.active.saturating_sub(1);
            debug!("Stream closed on {} ({} active)", object_id, entry.active);
            if entry.active > 0 {
                return None;
            }
            entry.pending_removal.take()
        };

        if pending.is_some() || !self.entries.get(object_id).is_some_and(|e| e.deleting) {
            self.entries.remove_if(object_id, |_, entry| entry.active == 0);
        }
        pending
    }
}

/// Outstanding delete of one object; dropping it without `commit` re-opens
/// the object for streaming.
pub struct DeleteGuard<'a> {
    registry: &'a StreamRegistry,
    object_id: String,
    finished: bool,
}

impl DeleteGuard<'_> {
    /// Call once the record is gone. Returns `true` when no stream holds the
    /// object and the caller should remove the bytes now; otherwise removal
    /// happens when the last stream closes.
    pub fn commit(mut self, location: &str) -> bool {
        self.finished = true;
        self.registry.commit_delete(&self.object_id, location)
    }
}

impl Drop for DeleteGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.registry.abort_delete(&self.object_id);
        }
    }
}

/// One active producer. Dropping it closes the stream: the last-access time is
/// recorded once and deferred removals are carried out.
pub struct StreamLease {
    registry: StreamRegistry,
    object_id: String,
    touch_on_close: bool,
}

impl StreamLease {
    /// Records last access when the lease is dropped. Armed only once a
    /// producer exists, so requests that fail earlier leave no trace.
    pub fn touch_on_close(&mut self) {
        self.touch_on_close = true;
    }
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        let pending = self.registry.release(&self.object_id);

        let Ok(handle) = Handle::try_current() else {
            if let Some(location) = pending {
                warn!("No runtime to remove {}; left for cleanup", location);
            }
            return;
        };

        if self.touch_on_close {
            let store = self.registry.store.clone();
            let object_id = self.object_id.clone();
            handle.spawn(async move {
                if let Err(e) = store.touch_object(&object_id, Utc::now()).await {
                    warn!("Failed to record last access for {}: {}", object_id, e);
                }
            });
        }

        if let Some(location) = pending {
            let storage = self.registry.storage.clone();
            handle.spawn(async move {
                match storage.remove(&location).await {
                    Ok(()) => info!("🗑️  Removed {} after last stream closed", location),
                    Err(e) => warn!("Failed to remove {}: {}", location, e),
                }
            });
        }
    }
}
