use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::AppState;
use crate::auth::middleware::COOKIE_NAME;
use crate::error::AppError;
use crate::models::session::AuthResponse;
use crate::models::user::{LoginRequest, RefreshRequest, RegisterRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
}

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), AppError> {
    let (user, tokens) = state.auth.register(body).await?;
    let cookie = build_auth_cookie(tokens.access_token.clone(), state.config.access_token_minutes);

    Ok((
        StatusCode::CREATED,
        jar.add(cookie),
        Json(AuthResponse {
            user: user.into_response(state.users.storage()),
            tokens,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, tokens) = state.auth.login(body).await?;
    let cookie = build_auth_cookie(tokens.access_token.clone(), state.config.access_token_minutes);

    Ok((
        jar.add(cookie),
        Json(AuthResponse {
            user: user.into_response(state.users.storage()),
            tokens,
        }),
    ))
}

async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RefreshRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, tokens) = state.auth.refresh(&body.refresh_token).await?;
    let cookie = build_auth_cookie(tokens.access_token.clone(), state.config.access_token_minutes);

    Ok((
        jar.add(cookie),
        Json(AuthResponse {
            user: user.into_response(state.users.storage()),
            tokens,
        }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RefreshRequest>,
) -> Result<(CookieJar, StatusCode), AppError> {
    state.auth.logout(&body.refresh_token).await?;
    Ok((
        jar.remove(Cookie::build(COOKIE_NAME).path("/")),
        StatusCode::NO_CONTENT,
    ))
}

fn build_auth_cookie(token: String, minutes: i64) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(minutes))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_cookie_is_http_only_and_scoped_to_root() {
        let cookie = build_auth_cookie("abc".into(), 15);
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::minutes(15)));
    }
}
