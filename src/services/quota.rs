use crate::config::StorageConfig;
use crate::services::error::{StorageError, StorageResult};
use crate::services::metadata_store::{MetadataStore, QuotaRecord};
use crate::utils::keyed_mutex::KeyedMutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::ToSchema;

/// Pure quota accounting for one principal.
///
/// `bytes_allowed == None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaState {
    pub bytes_used: u64,
    pub bytes_allowed: Option<u64>,
}

impl QuotaState {
    /// A zero or missing limit is unlimited only when `unlimited_when_unset` is set,
    /// otherwise it is a hard limit of zero.
    pub fn from_record(record: QuotaRecord, unlimited_when_unset: bool) -> Self {
        let bytes_allowed = match record.bytes_allowed {
            Some(limit) if limit > 0 => Some(limit),
            _ if unlimited_when_unset => None,
            _ => Some(0),
        };
        Self {
            bytes_used: record.bytes_used,
            bytes_allowed,
        }
    }

    pub fn reserve(&self, delta: u64) -> StorageResult<QuotaState> {
        let Some(allowed) = self.bytes_allowed else {
            return Ok(Self {
                bytes_used: self.bytes_used.saturating_add(delta),
                ..*self
            });
        };

        match self.bytes_used.checked_add(delta) {
            Some(next) if next <= allowed => Ok(Self {
                bytes_used: next,
                ..*self
            }),
            _ => Err(StorageError::QuotaExceeded {
                requested: delta,
                available: allowed.saturating_sub(self.bytes_used),
            }),
        }
    }

    pub fn release(&self, delta: u64) -> QuotaState {
        Self {
            bytes_used: self.bytes_used.saturating_sub(delta),
            ..*self
        }
    }

    pub fn usage_percent(&self) -> f64 {
        match self.bytes_allowed {
            None => 0.0,
            Some(0) => 100.0,
            Some(allowed) => self.bytes_used as f64 * 100.0 / allowed as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    Ok,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuotaUsage {
    pub bytes_used: u64,
    /// `null` when the principal has no limit.
    pub bytes_allowed: Option<u64>,
    pub usage_percent: f64,
    pub level: UsageLevel,
}

/// Per-principal storage accounting backed by the metadata store.
///
/// Every mutation for a principal runs under that principal's lock, so
/// concurrent reservations cannot jointly exceed the limit.
pub struct QuotaLedger {
    store: Arc<dyn MetadataStore>,
    locks: KeyedMutex,
    unlimited_when_unset: bool,
    warning_threshold: f64,
    critical_threshold: f64,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn MetadataStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            locks: KeyedMutex::new(),
            unlimited_when_unset: config.unlimited_quota_when_unset,
            warning_threshold: config.warning_threshold,
            critical_threshold: config.critical_threshold,
        }
    }

    async fn load(&self, principal: &str) -> StorageResult<QuotaState> {
        let record = self
            .store
            .quota(principal)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("principal {}", principal)))?;
        Ok(QuotaState::from_record(record, self.unlimited_when_unset))
    }

    /// Adds `delta` to the principal's usage, or fails with `QuotaExceeded`
    /// without mutating anything.
    pub async fn reserve(&self, principal: &str, delta: u64) -> StorageResult<()> {
        let _guard = self.locks.lock(principal).await;

        let current = self.load(principal).await?;
        let next = current.reserve(delta).inspect_err(|_| {
            warn!(
                "Quota rejected for {}: {} + {} over {:?}",
                principal, current.bytes_used, delta, current.bytes_allowed
            );
        })?;

        self.store.set_bytes_used(principal, next.bytes_used).await?;
        debug!("Reserved {} bytes for {} (now {})", delta, principal, next.bytes_used);
        Ok(())
    }

    /// Subtracts `delta`, clamping at zero. Used by deletion and rollback.
    pub async fn release(&self, principal: &str, delta: u64) -> StorageResult<()> {
        let _guard = self.locks.lock(principal).await;

        let current = self.load(principal).await?;
        let next = current.release(delta);
        if delta > current.bytes_used {
            warn!(
                "Release of {} bytes for {} clamped at zero (was {})",
                delta, principal, current.bytes_used
            );
        }

        self.store.set_bytes_used(principal, next.bytes_used).await?;
        debug!("Released {} bytes for {} (now {})", delta, principal, next.bytes_used);
        Ok(())
    }

    /// Removes an object record and releases its bytes in one metadata
    /// transaction under the owner's lock. Returns `false`, releasing nothing,
    /// when the record was already gone.
    pub async fn release_object(
        &self,
        principal: &str,
        object_id: &str,
        size: u64,
    ) -> StorageResult<bool> {
        let _guard = self.locks.lock(principal).await;

        let removed = self.store.delete_object(object_id, principal, size).await?;
        if removed {
            debug!("Released {} bytes for {} with {}", size, principal, object_id);
        }
        Ok(removed)
    }

    pub async fn usage_percent(&self, principal: &str) -> StorageResult<f64> {
        Ok(self.load(principal).await?.usage_percent())
    }

    pub async fn usage(&self, principal: &str) -> StorageResult<QuotaUsage> {
        let state = self.load(principal).await?;
        let percent = state.usage_percent();
        let ratio = percent / 100.0;

        let level = if state.bytes_allowed.is_none() {
            UsageLevel::Ok
        } else if ratio >= self.critical_threshold {
            UsageLevel::Critical
        } else if ratio >= self.warning_threshold {
            UsageLevel::Warning
        } else {
            UsageLevel::Ok
        };

        Ok(QuotaUsage {
            bytes_used: state.bytes_used,
            bytes_allowed: state.bytes_allowed,
            usage_percent: percent,
            level,
        })
    }

    /// Drops per-principal locks nobody holds.
    pub fn cleanup_locks(&self) {
        self.locks.cleanup();
    }
}
