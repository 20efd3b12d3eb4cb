use crate::api::error::AppError;
use crate::services::file_service::{StreamResponse, StreamStatus};
use crate::utils::auth::Claims;
use axum::{
    Extension,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::client_ip;

#[utoipa::path(
    get,
    path = "/download/{id}",
    params(
        ("id" = String, Path, description = "Stored object ID")
    ),
    responses(
        (status = 200, description = "File content as an attachment"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let response = state
        .file_service
        .download(&claims.sub, &file_id, client_ip(&headers))
        .await?;

    tracing::info!(
        "📎 Download file_id={} user={} size={}",
        file_id,
        claims.sub,
        response.total_length
    );

    build_stream_response(response, "attachment")
}

pub(crate) fn content_disposition(disposition_type: &str, filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition_type, fallback_filename, encoded_filename
    )
}

/// Turns a prepared stream into a 200 or 206 response whose body is the chunk
/// producer itself.
pub(crate) fn build_stream_response(
    stream: StreamResponse,
    disposition_type: &str,
) -> Result<Response, AppError> {
    let status = match stream.status {
        StreamStatus::Full => StatusCode::OK,
        StreamStatus::Partial => StatusCode::PARTIAL_CONTENT,
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, stream.content_type)
        .header(header::CONTENT_LENGTH, stream.content_length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(disposition_type, &stream.display_name),
        )
        .header(header::CACHE_CONTROL, "private, no-transform");

    if let Some(range) = &stream.content_range {
        builder = builder.header(header::CONTENT_RANGE, range);
    }

    builder
        .body(Body::from_stream(stream.producer))
        .map_err(|e| AppError::Internal(format!("Failed to build stream response: {}", e)))
}
