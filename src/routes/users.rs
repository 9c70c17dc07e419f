use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::AuthUser;
use crate::avatar::MAX_AVATAR_BYTES;
use crate::error::AppError;
use crate::models::ttr::{TtrResponse, TtrScope};
use crate::models::user::{ChangePasswordRequest, UpdateProfileRequest, UserResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users/me/avatar", post(upload_avatar).delete(delete_avatar))
        // multipart framing on top of the image itself
        .route_layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024))
        .route("/api/v1/users", get(search_users))
        .route("/api/v1/users/me", get(me).put(update_me).delete(delete_me))
        .route("/api/v1/users/me/password", put(change_password))
        .route("/api/v1/users/me/ttrs", get(my_ttrs))
        .route("/api/v1/users/{id}", get(get_user))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn search_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.users.search(&params.q, params.limit, params.offset).await?;
    let storage = state.users.storage();
    Ok(Json(users.into_iter().map(|u| u.into_response(storage)).collect()))
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get(auth.user_id).await?;
    Ok(Json(user.into_response(state.users.storage())))
}

async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get(id).await?;
    Ok(Json(user.into_response(state.users.storage())))
}

async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.update_profile(auth.user_id, body).await?;
    Ok(Json(user.into_response(state.users.storage())))
}

async fn delete_me(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode, AppError> {
    state.users.delete_account(auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .users
        .change_password(auth.user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidArgument(format!("Invalid multipart data: {e}")))?
    {
        if field.name() != Some("avatar") && field.name() != Some("file") {
            continue;
        }
        let mime = field
            .content_type()
            .ok_or_else(|| AppError::InvalidArgument("File missing content type".into()))?
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidArgument(format!("Failed to read file: {e}")))?;
        file = Some((mime, bytes.to_vec()));
    }

    let (mime, bytes) =
        file.ok_or_else(|| AppError::InvalidArgument("No avatar file provided".into()))?;
    let user = state.users.upload_avatar(auth.user_id, bytes, mime).await?;
    Ok(Json(user.into_response(state.users.storage())))
}

async fn delete_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.delete_avatar(auth.user_id).await?;
    Ok(Json(user.into_response(state.users.storage())))
}

#[derive(Debug, Deserialize)]
struct MyTtrsParams {
    scope: Option<TtrScope>,
}

async fn my_ttrs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<MyTtrsParams>,
) -> Result<Json<Vec<TtrResponse>>, AppError> {
    let scope = params.scope.unwrap_or(TtrScope::Upcoming);
    let ttrs = state.ttrs.my_ttrs(auth.user_id, scope).await?;
    Ok(Json(ttrs.into_iter().map(|t| t.into_response()).collect()))
}
