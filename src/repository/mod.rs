//! Persistence interfaces consumed by the services.
//!
//! Every method returns a `Send` future so services stay usable from axum
//! handlers whatever the backing store. Writes that guard a roster invariant
//! (capacity, single membership, single pending invitation) are single
//! repository calls so an implementation can make them atomic.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::invitation::{Invitation, InvitationStatus, NewInvitation};
use crate::models::notification::{NewNotification, Notification};
use crate::models::session::RefreshToken;
use crate::models::ttr::{CoCaptain, NewTtr, Player, PlayerStatus, Ttr, TtrPatch, TtrScope, TtrStatus};
use crate::models::user::{NewUser, User};

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgRepository;

type Res<T> = Result<T, AppError>;

/// Result of trying to put a user on a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatOutcome {
    Seated,
    Full,
    AlreadySeated,
    TtrMissing,
}

#[derive(Debug, Clone)]
pub enum TtrUpdate {
    Updated(Ttr),
    Missing,
    /// The requested capacity is below the current roster size.
    BelowRoster { players: i64 },
}

#[derive(Debug, Clone)]
pub enum AcceptOutcome {
    Accepted(Invitation),
    NotPending,
    Full,
    TtrMissing,
}

pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` when a live account already uses the email.
    fn create_user(&self, user: NewUser) -> impl Future<Output = Res<User>> + Send;
    /// Soft-deleted accounts are never returned.
    fn find_user(&self, id: Uuid) -> impl Future<Output = Res<Option<User>>> + Send;
    fn find_user_by_email(&self, email: &str) -> impl Future<Output = Res<Option<User>>> + Send;
    fn user_exists(&self, id: Uuid) -> impl Future<Output = Res<bool>> + Send;
    fn update_user(&self, user: &User) -> impl Future<Output = Res<User>> + Send;
    fn search_users(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Res<Vec<User>>> + Send;
    fn soft_delete_user(&self, id: Uuid, at: DateTime<Utc>) -> impl Future<Output = Res<()>> + Send;
}

pub trait SessionRepository: Send + Sync {
    fn insert_refresh_token(
        &self,
        user_id: Uuid,
        secret_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Res<RefreshToken>> + Send;
    fn find_refresh_token(&self, id: Uuid) -> impl Future<Output = Res<Option<RefreshToken>>> + Send;
    fn revoke_user_tokens(&self, user_id: Uuid) -> impl Future<Output = Res<u64>> + Send;
    fn delete_expired_tokens(&self, now: DateTime<Utc>) -> impl Future<Output = Res<u64>> + Send;
}

pub trait TtrRepository: Send + Sync {
    /// Inserts the TTR with `captain` as captain, creator and first `CONFIRMED` player.
    fn create_ttr(&self, captain: Uuid, ttr: NewTtr) -> impl Future<Output = Res<Ttr>> + Send;
    fn find_ttr(&self, id: Uuid) -> impl Future<Output = Res<Option<Ttr>>> + Send;
    /// Ordered by tee date and time ascending.
    fn list_ttrs(
        &self,
        limit: i64,
        offset: i64,
        status: Option<TtrStatus>,
    ) -> impl Future<Output = Res<Vec<Ttr>>> + Send;
    fn list_ttrs_for_user(
        &self,
        user_id: Uuid,
        scope: TtrScope,
        today: NaiveDate,
    ) -> impl Future<Output = Res<Vec<Ttr>>> + Send;
    fn update_ttr(&self, id: Uuid, patch: &TtrPatch) -> impl Future<Output = Res<TtrUpdate>> + Send;
    /// Removes co-captains, players and invitations along with the TTR.
    fn delete_ttr(&self, id: Uuid) -> impl Future<Output = Res<bool>> + Send;

    fn add_co_captain(&self, ttr_id: Uuid, user_id: Uuid) -> impl Future<Output = Res<()>> + Send;
    fn remove_co_captain(&self, ttr_id: Uuid, user_id: Uuid) -> impl Future<Output = Res<bool>> + Send;
    fn is_co_captain(&self, ttr_id: Uuid, user_id: Uuid) -> impl Future<Output = Res<bool>> + Send;
    fn list_co_captains(&self, ttr_id: Uuid) -> impl Future<Output = Res<Vec<CoCaptain>>> + Send;

    /// Capacity check and insert as one step.
    fn seat_player(
        &self,
        ttr_id: Uuid,
        user_id: Uuid,
        status: PlayerStatus,
    ) -> impl Future<Output = Res<SeatOutcome>> + Send;
    fn remove_player(&self, ttr_id: Uuid, user_id: Uuid) -> impl Future<Output = Res<bool>> + Send;
    /// In-place status change; `joined_at` is preserved.
    fn set_player_status(
        &self,
        ttr_id: Uuid,
        user_id: Uuid,
        status: PlayerStatus,
    ) -> impl Future<Output = Res<bool>> + Send;
    /// Ordered by `joined_at`.
    fn list_players(&self, ttr_id: Uuid) -> impl Future<Output = Res<Vec<Player>>> + Send;
}

pub trait InvitationRepository: Send + Sync {
    /// Fails with `AlreadyExists` if a pending invitation for the pair already exists.
    fn create_invitation(&self, invitation: NewInvitation) -> impl Future<Output = Res<Invitation>> + Send;
    fn find_invitation(&self, id: Uuid) -> impl Future<Output = Res<Option<Invitation>>> + Send;
    fn find_pending_invitation(
        &self,
        ttr_id: Uuid,
        invitee_id: Uuid,
    ) -> impl Future<Output = Res<Option<Invitation>>> + Send;
    /// Newest first.
    fn list_received(&self, invitee_id: Uuid) -> impl Future<Output = Res<Vec<Invitation>>> + Send;
    /// Newest first.
    fn list_sent(&self, inviter_id: Uuid) -> impl Future<Output = Res<Vec<Invitation>>> + Send;
    /// Moves a `PENDING` invitation to `status`. Returns `None` if it is no longer pending.
    fn resolve_invitation(
        &self,
        id: Uuid,
        status: InvitationStatus,
        responded_at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Res<Option<Invitation>>> + Send;
    /// Seats the invitee and marks the invitation `YES` as one step.
    fn accept_invitation(
        &self,
        id: Uuid,
        responded_at: DateTime<Utc>,
    ) -> impl Future<Output = Res<AcceptOutcome>> + Send;
}

pub trait NotificationRepository: Send + Sync {
    fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> impl Future<Output = Res<Notification>> + Send;
    /// Newest first.
    fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Res<Vec<Notification>>> + Send;
    fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Res<bool>> + Send;
    fn mark_all_notifications_read(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Res<u64>> + Send;
}
