use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::invitation::{
    CreateInvitationRequest, Invitation, InvitationBox, RespondInvitationRequest,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/invitations", post(create_invitation))
        .route("/api/v1/invitations/me", get(my_invitations))
        .route(
            "/api/v1/invitations/{id}",
            get(get_invitation).delete(cancel_invitation),
        )
        .route("/api/v1/invitations/{id}/respond", put(respond))
}

async fn create_invitation(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<Invitation>), AppError> {
    let message = body.message.filter(|m| !m.trim().is_empty());
    let invitation = state
        .invitations
        .create(body.ttr_id, auth.user_id, body.invitee_user_id, message)
        .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(rename = "type", default)]
    which: InvitationBox,
}

async fn my_invitations(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Invitation>>, AppError> {
    Ok(Json(state.invitations.list(auth.user_id, params.which).await?))
}

async fn get_invitation(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Invitation>, AppError> {
    Ok(Json(state.invitations.get(id).await?))
}

async fn respond(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RespondInvitationRequest>,
) -> Result<Json<Invitation>, AppError> {
    let invitation = state
        .invitations
        .respond(id, auth.user_id, &body.status)
        .await?;
    Ok(Json(invitation))
}

async fn cancel_invitation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.invitations.cancel(id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
