use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ttr_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TtrStatus {
    Open,
    Confirmed,
    Cancelled,
    Completed,
}

impl FromStr for TtrStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(AppError::InvalidArgument(format!("Invalid TTR status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "player_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Confirmed,
    Maybe,
    Declined,
}

impl FromStr for PlayerStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(Self::Confirmed),
            "MAYBE" => Ok(Self::Maybe),
            "DECLINED" => Ok(Self::Declined),
            other => Err(AppError::InvalidArgument(format!("Invalid player status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Ttr {
    pub id: Uuid,
    pub course_name: String,
    pub course_location: Option<String>,
    pub tee_date: NaiveDate,
    pub tee_time: NaiveTime,
    pub max_players: i32,
    pub created_by: Uuid,
    pub captain_id: Uuid,
    pub status: TtrStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CoCaptain {
    pub ttr_id: Uuid,
    pub user_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Player {
    pub ttr_id: Uuid,
    pub user_id: Uuid,
    pub status: PlayerStatus,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTtr {
    pub course_name: String,
    pub course_location: Option<String>,
    pub tee_date: NaiveDate,
    pub tee_time: NaiveTime,
    pub max_players: i32,
    pub notes: Option<String>,
}

/// Partial update: every `Some` field overwrites, every `None` field is left alone.
#[derive(Debug, Clone, Default)]
pub struct TtrPatch {
    pub course_name: Option<String>,
    pub course_location: Option<String>,
    pub tee_date: Option<NaiveDate>,
    pub tee_time: Option<NaiveTime>,
    pub max_players: Option<i32>,
    pub status: Option<TtrStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtrScope {
    Upcoming,
    Past,
}

/// A TTR with its co-captains and roster loaded.
#[derive(Debug, Clone)]
pub struct TtrDetails {
    pub ttr: Ttr,
    pub co_captains: Vec<CoCaptain>,
    pub players: Vec<Player>,
}

impl TtrDetails {
    pub fn player(&self, user_id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }
}

#[derive(Debug, Serialize)]
pub struct TtrResponse {
    pub id: Uuid,
    pub course_name: String,
    pub course_location: Option<String>,
    pub tee_date: String,
    pub tee_time: String,
    pub max_players: i32,
    pub created_by: Uuid,
    pub captain_id: Uuid,
    pub status: TtrStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co_captains: Option<Vec<CoCaptain>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<Player>>,
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

impl Ttr {
    pub fn into_response(self) -> TtrResponse {
        TtrResponse {
            id: self.id,
            course_name: self.course_name,
            course_location: self.course_location,
            tee_date: self.tee_date.format(DATE_FORMAT).to_string(),
            tee_time: self.tee_time.format(TIME_FORMAT).to_string(),
            max_players: self.max_players,
            created_by: self.created_by,
            captain_id: self.captain_id,
            status: self.status,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            co_captains: None,
            players: None,
        }
    }
}

impl TtrDetails {
    pub fn into_response(self) -> TtrResponse {
        TtrResponse {
            co_captains: Some(self.co_captains),
            players: Some(self.players),
            ..self.ttr.into_response()
        }
    }
}

pub fn parse_tee_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
        AppError::InvalidArgument("Invalid tee_date format, expected YYYY-MM-DD".into())
    })
}

pub fn parse_tee_time(raw: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|_| AppError::InvalidArgument("Invalid tee_time format, expected HH:MM".into()))
}

#[derive(Debug, Deserialize)]
pub struct CreateTtrRequest {
    pub course_name: String,
    pub course_location: Option<String>,
    pub tee_date: String,
    pub tee_time: String,
    pub max_players: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTtrRequest {
    pub course_name: Option<String>,
    pub course_location: Option<String>,
    pub tee_date: Option<String>,
    pub tee_time: Option<String>,
    pub max_players: Option<i32>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddCoCaptainRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlayerStatusRequest {
    pub status: String,
}
