use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::ttr::{
    AddCoCaptainRequest, CreateTtrRequest, NewTtr, Player, TtrPatch, TtrResponse,
    UpdatePlayerStatusRequest, UpdateTtrRequest, parse_tee_date, parse_tee_time,
};

/// Request-level bound; the roster rules themselves only need a positive capacity.
const MAX_PLAYERS_LIMIT: i32 = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/ttrs", post(create_ttr).get(search_ttrs))
        .route(
            "/api/v1/ttrs/{id}",
            get(get_ttr).put(update_ttr).delete(delete_ttr),
        )
        .route("/api/v1/ttrs/{id}/co-captains", post(add_co_captain))
        .route(
            "/api/v1/ttrs/{id}/co-captains/{user_id}",
            delete(remove_co_captain),
        )
        .route("/api/v1/ttrs/{id}/join", post(join_ttr))
        .route("/api/v1/ttrs/{id}/leave", post(leave_ttr))
        .route("/api/v1/ttrs/{id}/players", get(get_players))
        .route("/api/v1/ttrs/{id}/players/{user_id}", put(update_player_status))
}

fn check_max_players(max_players: i32) -> Result<i32, AppError> {
    if !(1..=MAX_PLAYERS_LIMIT).contains(&max_players) {
        return Err(AppError::InvalidArgument(format!(
            "max_players must be between 1 and {MAX_PLAYERS_LIMIT}"
        )));
    }
    Ok(max_players)
}

fn new_ttr(body: CreateTtrRequest) -> Result<NewTtr, AppError> {
    Ok(NewTtr {
        course_name: body.course_name.trim().to_string(),
        course_location: body.course_location,
        tee_date: parse_tee_date(&body.tee_date)?,
        tee_time: parse_tee_time(&body.tee_time)?,
        max_players: check_max_players(body.max_players)?,
        notes: body.notes,
    })
}

/// Runs before the service, so malformed input wins over authorization.
fn ttr_patch(body: UpdateTtrRequest) -> Result<TtrPatch, AppError> {
    Ok(TtrPatch {
        course_name: body.course_name.map(|n| n.trim().to_string()),
        course_location: body.course_location,
        tee_date: body.tee_date.as_deref().map(parse_tee_date).transpose()?,
        tee_time: body.tee_time.as_deref().map(parse_tee_time).transpose()?,
        max_players: body.max_players.map(check_max_players).transpose()?,
        status: body.status.as_deref().map(str::parse).transpose()?,
        notes: body.notes,
    })
}

async fn create_ttr(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateTtrRequest>,
) -> Result<(StatusCode, Json<TtrResponse>), AppError> {
    let details = state.ttrs.create(auth.user_id, new_ttr(body)?).await?;
    Ok((StatusCode::CREATED, Json(details.into_response())))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    limit: Option<i64>,
    offset: Option<i64>,
    status: Option<String>,
}

async fn search_ttrs(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<TtrResponse>>, AppError> {
    let status = params.status.as_deref().filter(|s| !s.is_empty());
    let ttrs = state.ttrs.search(params.limit, params.offset, status).await?;
    Ok(Json(ttrs.into_iter().map(|t| t.into_response()).collect()))
}

async fn get_ttr(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TtrResponse>, AppError> {
    Ok(Json(state.ttrs.get(id).await?.into_response()))
}

async fn update_ttr(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTtrRequest>,
) -> Result<Json<TtrResponse>, AppError> {
    let details = state.ttrs.update(id, auth.user_id, ttr_patch(body)?).await?;
    Ok(Json(details.into_response()))
}

async fn delete_ttr(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.ttrs.delete(id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_co_captain(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AddCoCaptainRequest>,
) -> Result<Json<TtrResponse>, AppError> {
    let details = state
        .ttrs
        .add_co_captain(id, auth.user_id, body.user_id)
        .await?;
    Ok(Json(details.into_response()))
}

async fn remove_co_captain(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.ttrs.remove_co_captain(id, auth.user_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn join_ttr(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TtrResponse>, AppError> {
    Ok(Json(state.ttrs.join(id, auth.user_id).await?.into_response()))
}

async fn leave_ttr(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.ttrs.leave(id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_players(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Player>>, AppError> {
    Ok(Json(state.ttrs.players(id).await?))
}

async fn update_player_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdatePlayerStatusRequest>,
) -> Result<Json<Vec<Player>>, AppError> {
    let players = state
        .ttrs
        .update_player_status(id, auth.user_id, user_id, &body.status)
        .await?;
    Ok(Json(players))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ttr::TtrStatus;

    fn create_body(max_players: i32, tee_time: &str) -> CreateTtrRequest {
        CreateTtrRequest {
            course_name: "  Oak Hollow ".into(),
            course_location: None,
            tee_date: "2026-09-12".into(),
            tee_time: tee_time.into(),
            max_players,
            notes: None,
        }
    }

    #[test]
    fn create_request_is_parsed_and_bounded() {
        let ttr = new_ttr(create_body(4, "09:10")).unwrap();
        assert_eq!(ttr.course_name, "Oak Hollow");
        assert_eq!(ttr.tee_time.format("%H:%M").to_string(), "09:10");

        assert!(matches!(new_ttr(create_body(9, "09:10")), Err(AppError::InvalidArgument(_))));
        assert!(matches!(new_ttr(create_body(0, "09:10")), Err(AppError::InvalidArgument(_))));
        assert!(matches!(new_ttr(create_body(4, "9am")), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn update_request_keeps_absent_fields_absent() {
        let patch = ttr_patch(UpdateTtrRequest {
            status: Some("COMPLETED".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(patch.status, Some(TtrStatus::Completed));
        assert!(patch.course_name.is_none());
        assert!(patch.max_players.is_none());
        assert!(patch.tee_date.is_none());

        assert!(matches!(
            ttr_patch(UpdateTtrRequest {
                status: Some("POSTPONED".into()),
                ..Default::default()
            }),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn update_request_rejects_out_of_range_capacity() {
        for max_players in [0, 9] {
            assert!(matches!(
                ttr_patch(UpdateTtrRequest {
                    max_players: Some(max_players),
                    ..Default::default()
                }),
                Err(AppError::InvalidArgument(_))
            ));
        }
        let patch = ttr_patch(UpdateTtrRequest {
            max_players: Some(8),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(patch.max_players, Some(8));
    }
}
