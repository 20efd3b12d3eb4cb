use crate::AppState;
use crate::api::error::AppError;
use crate::services::quota::QuotaUsage;
use crate::utils::auth::Claims;
use axum::{Extension, Json, extract::State};

#[utoipa::path(
    get,
    path = "/quota",
    responses(
        (status = 200, description = "Storage usage of the caller", body = QuotaUsage),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn get_quota(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<QuotaUsage>, AppError> {
    let usage = state.file_service.ledger().usage(&claims.sub).await?;
    Ok(Json(usage))
}
