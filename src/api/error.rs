use crate::services::error::StorageError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn error_body(status: StatusCode, message: String, code: &str) -> Response {
    (status, Json(json!({ "error": message, "code": code }))).into_response()
}

impl AppError {
    fn storage_response(err: StorageError) -> Response {
        let code = err.code();
        match err {
            StorageError::DisallowedType { .. }
            | StorageError::QuotaExceeded { .. }
            | StorageError::InvalidInput(_) => {
                error_body(StatusCode::BAD_REQUEST, err.to_string(), code)
            }
            StorageError::InvalidRange { content_length, .. } => {
                let mut response =
                    error_body(StatusCode::RANGE_NOT_SATISFIABLE, err.to_string(), code);
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", content_length)) {
                    response.headers_mut().insert(header::CONTENT_RANGE, value);
                }
                response
            }
            StorageError::ResourceBusy(_) => error_body(StatusCode::CONFLICT, err.to_string(), code),
            StorageError::NotFound(_) => error_body(StatusCode::NOT_FOUND, err.to_string(), code),
            StorageError::Forbidden => error_body(StatusCode::FORBIDDEN, err.to_string(), code),
            StorageError::PayloadTooLarge { .. } => {
                error_body(StatusCode::PAYLOAD_TOO_LARGE, err.to_string(), code)
            }
            StorageError::RateLimited { retry_after_secs } => {
                let mut response =
                    error_body(StatusCode::TOO_MANY_REQUESTS, err.to_string(), code);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            StorageError::StorageIo(ref e) => {
                tracing::error!("Storage I/O error: {:?}", e);
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    code,
                )
            }
            StorageError::Metadata(ref e) => {
                tracing::error!("Metadata error: {:?}", e);
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    code,
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg, "INVALID_REQUEST"),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    "INTERNAL",
                )
            }
            AppError::PayloadTooLarge(msg) => {
                error_body(StatusCode::PAYLOAD_TOO_LARGE, msg, "PAYLOAD_TOO_LARGE")
            }
            AppError::Storage(e) => Self::storage_response(e),
        }
    }
}
