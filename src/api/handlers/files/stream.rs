use crate::api::error::AppError;
use crate::services::file_service::stream::ReadAccess;
use crate::utils::auth::Claims;
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::Response,
};

use super::download::build_stream_response;
use super::types::StreamQuery;

#[utoipa::path(
    get,
    path = "/stream/{id}",
    params(
        ("id" = String, Path, description = "Stored object ID"),
        ("quality" = Option<QualityHint>, Query, description = "Pins the chunk size tier; `auto` adapts to throughput"),
        ("Range" = Option<String>, Header, description = "Single byte range, e.g. `bytes=0-1023`")
    ),
    responses(
        (status = 200, description = "Whole object"),
        (status = 206, description = "Requested byte range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not readable by caller"),
        (status = 404, description = "File not found"),
        (status = 416, description = "Range not satisfiable")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn stream_file(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    // A non-ASCII value cannot be a byte range; the parser rejects the empty
    // expression as malformed, which answers 416.
    let range = headers
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or_default());

    let response = state
        .file_service
        .serve(
            &claims.sub,
            &file_id,
            range,
            query.quality.unwrap_or_default(),
            ReadAccess::OwnerOrPublic,
        )
        .await?;

    tracing::debug!(
        "▶️  Stream file_id={} user={} range={:?}",
        file_id,
        claims.sub,
        response.content_range
    );

    build_stream_response(response, "inline")
}
