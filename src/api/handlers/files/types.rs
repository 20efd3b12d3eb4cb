use crate::services::streaming::QualityHint;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub category: String,
    pub tags: Vec<String>,
}

/// Non-file fields of an upload form.
#[derive(Debug, Default, Validate)]
pub struct UploadForm {
    #[validate(length(min = 1, max = 32, message = "Invalid category"))]
    pub category: Option<String>,
    #[validate(length(max = 50, message = "Too many tags"))]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StreamQuery {
    pub quality: Option<QualityHint>,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub id: String,
    pub deleted: bool,
}
