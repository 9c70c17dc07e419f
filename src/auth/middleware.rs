use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;

use super::jwt;

pub const COOKIE_NAME: &str = "token";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Bearer header wins over the cookie when both are present.
fn access_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(COOKIE_NAME)
        .map(|c| c.value().to_string())
}

fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthUser, AppError> {
    let token = access_token(headers).ok_or(AppError::Unauthenticated)?;
    let claims = jwt::validate_access_token(&token, secret)?;
    Ok(AuthUser {
        user_id: claims.sub,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, &state.config.jwt_secret)
    }
}
