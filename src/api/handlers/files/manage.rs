use crate::api::error::AppError;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::HeaderMap,
};

use super::client_ip;
use super::types::DeleteResponse;

#[utoipa::path(
    post,
    path = "/delete/{id}",
    params(
        ("id" = String, Path, description = "Stored object ID")
    ),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File not found"),
        (status = 409, description = "File is being streamed")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>, AppError> {
    state
        .file_service
        .delete_object(&claims.sub, &file_id, client_ip(&headers))
        .await?;

    Ok(Json(DeleteResponse {
        id: file_id,
        deleted: true,
    }))
}
