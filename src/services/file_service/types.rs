use crate::services::metadata_store::StoredObject;
use crate::services::storage::StagingEntry;
use crate::services::streaming::ChunkProducer;

/// Everything about an upload except its bytes.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub principal: String,
    /// Category chosen by the uploader; derived from the extension when absent.
    pub category: Option<String>,
    pub tag_ids: Vec<String>,
    pub client_ip: Option<String>,
}

/// Body fully written to staging, not yet accounted or visible.
#[derive(Debug)]
pub struct StagedUpload {
    pub entry: StagingEntry,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct CommittedUpload {
    pub object: StoredObject,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Full,
    Partial,
}

pub struct StreamResponse {
    pub status: StreamStatus,
    /// Bytes the producer will yield.
    pub content_length: u64,
    /// Size of the whole object.
    pub total_length: u64,
    pub content_range: Option<String>,
    pub content_type: &'static str,
    pub display_name: String,
    pub producer: ChunkProducer,
}
