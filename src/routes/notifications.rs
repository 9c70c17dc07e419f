use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::notification::{ListNotificationsParams, MarkAllReadResponse, Notification};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/notifications", get(list_notifications))
        .route("/api/v1/notifications/read-all", put(mark_all_read))
        .route("/api/v1/notifications/{id}/read", put(mark_read))
}

async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListNotificationsParams>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state
        .notifications
        .list(auth.user_id, params.unread, params.limit, params.offset)
        .await?;
    Ok(Json(notifications))
}

async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.notifications.mark_read(auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let marked = state.notifications.mark_all_read(auth.user_id).await?;
    Ok(Json(MarkAllReadResponse { marked }))
}
