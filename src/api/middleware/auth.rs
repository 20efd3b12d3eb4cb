use crate::AppState;
use crate::utils::auth::validate_jwt;
use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Bearer token from the `Authorization` header, or from `?token=` for media
/// elements that cannot set headers. The header wins when both are present.
fn bearer_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim().to_string());

    from_header
        .or_else(|| {
            serde_urlencoded::from_str::<TokenQuery>(req.uri().query()?)
                .ok()?
                .token
        })
        .filter(|token| !token.is_empty())
}

/// Resolves the principal behind the request and stores its claims on it.
/// Tokens for principals without a quota record are refused.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&req).ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = validate_jwt(&token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    let known = state
        .file_service
        .principal_exists(&claims.sub)
        .await
        .map_err(|e| {
            tracing::error!("Principal lookup for {} failed: {}", claims.sub, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    if !known {
        tracing::warn!("Token for unknown principal {}", claims.sub);
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
