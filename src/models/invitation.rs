use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Yes,
    No,
    Maybe,
    Canceled,
}

impl InvitationStatus {
    /// Statuses an invitee may answer with.
    pub fn is_response(self) -> bool {
        matches!(self, Self::Yes | Self::No | Self::Maybe)
    }
}

impl FromStr for InvitationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "YES" => Ok(Self::Yes),
            "NO" => Ok(Self::No),
            "MAYBE" => Ok(Self::Maybe),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(AppError::InvalidArgument(format!(
                "Invalid invitation status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Invitation {
    pub id: Uuid,
    pub ttr_id: Uuid,
    pub inviter_id: Uuid,
    pub invitee_id: Uuid,
    pub status: InvitationStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub ttr_id: Uuid,
    pub inviter_id: Uuid,
    pub invitee_id: Uuid,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationBox {
    #[default]
    Received,
    Sent,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub ttr_id: Uuid,
    pub invitee_user_id: Uuid,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondInvitationRequest {
    pub status: String,
}
