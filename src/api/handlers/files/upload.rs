use crate::api::error::AppError;
use crate::services::file_service::{StagedUpload, UploadRequest};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::HeaderMap,
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use validator::Validate;

use super::client_ip;
use super::types::*;

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "File upload with optional `category` and repeated `tags` fields"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "Disallowed type, quota exceeded or invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File too large"),
        (status = 429, description = "Upload rate limit exceeded")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut form = UploadForm::default();
    let mut staged: Option<StagedUpload> = None;

    // Errors are captured so the rest of the body can be drained before replying.
    let result: Result<Json<UploadResponse>, AppError> = async {
        state.file_service.admit_upload(&claims.sub)?;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "file" => {
                    if staged.is_some() {
                        return Err(AppError::BadRequest(
                            "Only one file per upload".to_string(),
                        ));
                    }
                    let original_filename = field.file_name().unwrap_or("unnamed").to_string();

                    // 1. Sanitize and screen the type before any byte is written
                    let display_name = state.file_service.prepare_name(&original_filename)?;

                    // 2. Stream the body into staging
                    let reader = StreamReader::new(field.map_err(std::io::Error::other));
                    staged = Some(
                        state
                            .file_service
                            .upload_to_staging(&claims.sub, &display_name, reader)
                            .await?,
                    );
                }
                "category" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    if !text.trim().is_empty() {
                        form.category = Some(text.trim().to_string());
                    }
                }
                "tags" | "tags[]" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.tags.extend(
                        text.split(',')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(str::to_string),
                    );
                }
                _ => {
                    tracing::debug!("Ignoring upload field {}", name);
                }
            }
        }

        form.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let staged = staged
            .take()
            .ok_or(AppError::BadRequest("No file provided".to_string()))?;

        // 3. Account, place and record
        let committed = state
            .file_service
            .process_upload(
                staged,
                UploadRequest {
                    principal: claims.sub.clone(),
                    category: form.category.take(),
                    tag_ids: std::mem::take(&mut form.tags),
                    client_ip: client_ip(&headers),
                },
            )
            .await?;

        Ok(Json(UploadResponse {
            id: committed.object.id,
            name: committed.object.storage_name,
            size: committed.object.size.max(0) as u64,
            category: committed.object.category,
            tags: committed.tag_ids,
        }))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Drain the remaining multipart stream so the client sees the error, not a reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}
