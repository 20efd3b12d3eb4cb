use crate::services::range::RangeError;
use thiserror::Error;

/// Failures of the admission and delivery core.
///
/// Every variant maps to exactly one HTTP status in `api::error`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File type not allowed: {extension}")]
    DisallowedType { extension: String },

    #[error("Storage limit exceeded: requested {requested} bytes, {available} available")]
    QuotaExceeded { requested: u64, available: u64 },

    #[error("Invalid range for object of {content_length} bytes: {reason}")]
    InvalidRange {
        content_length: u64,
        reason: RangeError,
    },

    #[error("Object {0} is being streamed")]
    ResourceBusy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File exceeds the maximum size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Upload rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("Storage I/O failure: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("Metadata store failure: {0}")]
    Metadata(#[from] sea_orm::DbErr),
}

impl StorageError {
    /// Stable machine-readable code returned alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DisallowedType { .. } => "DISALLOWED_TYPE",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::ResourceBusy(_) => "RESOURCE_BUSY",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidInput(_) => "INVALID_REQUEST",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::StorageIo(_) => "STORAGE_IO_FAILURE",
            Self::Metadata(_) => "METADATA_FAILURE",
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
