use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, unique_violation_as};
use crate::models::invitation::{Invitation, InvitationStatus, NewInvitation};
use crate::models::notification::{NewNotification, Notification};
use crate::models::session::RefreshToken;
use crate::models::ttr::{CoCaptain, NewTtr, Player, PlayerStatus, Ttr, TtrPatch, TtrScope, TtrStatus};
use crate::models::user::{NewUser, User};

use super::{
    AcceptOutcome, InvitationRepository, NotificationRepository, SeatOutcome, SessionRepository,
    TtrRepository, TtrUpdate, UserRepository,
};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, handicap, phone, \
                            avatar_key, created_at, updated_at, deleted_at";

const TTR_COLUMNS: &str = "id, course_name, course_location, tee_date, tee_time, max_players, \
                           created_by, captain_id, status, notes, created_at, updated_at";

const INVITATION_COLUMNS: &str =
    "id, ttr_id, inviter_id, invitee_id, status, message, created_at, responded_at";

/// Every repository interface over one shared connection pool.
#[derive(Clone)]
pub struct PgRepository {
    db: PgPool,
}

impl PgRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

impl UserRepository for PgRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, first_name, last_name)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_violation_as(e, "User with this email already exists"))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn user_exists(&self, id: Uuid) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn update_user(&self, user: &User) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
               password_hash = $2, first_name = $3, last_name = $4,
               handicap = $5, phone = $6, avatar_key = $7, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.handicap)
        .bind(&user.phone)
        .bind(&user.avatar_key)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    async fn search_users(&self, query: &str, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let pattern = format!("%{query}%");
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE deleted_at IS NULL
               AND (first_name ILIKE $1 OR last_name ILIKE $1 OR email ILIKE $1)
             ORDER BY last_name, first_name
             LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?)
    }

    async fn soft_delete_user(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

impl SessionRepository for PgRepository {
    async fn insert_refresh_token(
        &self,
        user_id: Uuid,
        secret_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        Ok(sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (user_id, secret_hash, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, secret_hash, expires_at, revoked, created_at",
        )
        .bind(user_id)
        .bind(secret_hash)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?)
    }

    async fn find_refresh_token(&self, id: Uuid) -> Result<Option<RefreshToken>, AppError> {
        Ok(sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, secret_hash, expires_at, revoked, created_at
             FROM refresh_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn revoke_user_tokens(&self, user_id: Uuid) -> Result<u64, AppError> {
        let res = sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE user_id = $1 AND NOT revoked")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let res = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}

impl TtrRepository for PgRepository {
    async fn create_ttr(&self, captain: Uuid, ttr: NewTtr) -> Result<Ttr, AppError> {
        let mut tx = self.db.begin().await?;

        let created = sqlx::query_as::<_, Ttr>(&format!(
            "INSERT INTO ttrs (course_name, course_location, tee_date, tee_time, max_players,
                               created_by, captain_id, status, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $6, 'OPEN', $7)
             RETURNING {TTR_COLUMNS}"
        ))
        .bind(&ttr.course_name)
        .bind(&ttr.course_location)
        .bind(ttr.tee_date)
        .bind(ttr.tee_time)
        .bind(ttr.max_players)
        .bind(captain)
        .bind(&ttr.notes)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO ttr_players (ttr_id, user_id, status) VALUES ($1, $2, 'CONFIRMED')")
            .bind(created.id)
            .bind(captain)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_ttr(&self, id: Uuid) -> Result<Option<Ttr>, AppError> {
        Ok(
            sqlx::query_as::<_, Ttr>(&format!("SELECT {TTR_COLUMNS} FROM ttrs WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.db)
                .await?,
        )
    }

    async fn list_ttrs(
        &self,
        limit: i64,
        offset: i64,
        status: Option<TtrStatus>,
    ) -> Result<Vec<Ttr>, AppError> {
        Ok(sqlx::query_as::<_, Ttr>(&format!(
            "SELECT {TTR_COLUMNS} FROM ttrs
             WHERE ($1::ttr_status IS NULL OR status = $1)
             ORDER BY tee_date ASC, tee_time ASC
             LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?)
    }

    async fn list_ttrs_for_user(
        &self,
        user_id: Uuid,
        scope: TtrScope,
        today: NaiveDate,
    ) -> Result<Vec<Ttr>, AppError> {
        let (filter, order) = match scope {
            TtrScope::Upcoming => ("t.tee_date >= $2", "t.tee_date ASC, t.tee_time ASC"),
            TtrScope::Past => ("t.tee_date < $2", "t.tee_date DESC, t.tee_time DESC"),
        };

        Ok(sqlx::query_as::<_, Ttr>(&format!(
            "SELECT {TTR_COLUMNS} FROM ttrs t
             WHERE {filter}
               AND (t.captain_id = $1
                    OR EXISTS (SELECT 1 FROM ttr_players p WHERE p.ttr_id = t.id AND p.user_id = $1)
                    OR EXISTS (SELECT 1 FROM ttr_co_captains c WHERE c.ttr_id = t.id AND c.user_id = $1))
             ORDER BY {order}"
        ))
        .bind(user_id)
        .bind(today)
        .fetch_all(&self.db)
        .await?)
    }

    async fn update_ttr(&self, id: Uuid, patch: &TtrPatch) -> Result<TtrUpdate, AppError> {
        let mut tx = self.db.begin().await?;

        let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM ttrs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(TtrUpdate::Missing);
        }

        if let Some(max_players) = patch.max_players {
            let (players,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ttr_players WHERE ttr_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            if i64::from(max_players) < players {
                return Ok(TtrUpdate::BelowRoster { players });
            }
        }

        let updated = sqlx::query_as::<_, Ttr>(&format!(
            "UPDATE ttrs SET
               course_name = COALESCE($2, course_name),
               course_location = COALESCE($3, course_location),
               tee_date = COALESCE($4, tee_date),
               tee_time = COALESCE($5, tee_time),
               max_players = COALESCE($6, max_players),
               status = COALESCE($7, status),
               notes = COALESCE($8, notes),
               updated_at = now()
             WHERE id = $1
             RETURNING {TTR_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.course_name)
        .bind(&patch.course_location)
        .bind(patch.tee_date)
        .bind(patch.tee_time)
        .bind(patch.max_players)
        .bind(patch.status)
        .bind(&patch.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(TtrUpdate::Updated(updated))
    }

    async fn delete_ttr(&self, id: Uuid) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM ttrs WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn add_co_captain(&self, ttr_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("INSERT INTO ttr_co_captains (ttr_id, user_id) VALUES ($1, $2)")
            .bind(ttr_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(|e| unique_violation_as(e, "User is already a co-captain"))?;
        Ok(())
    }

    async fn remove_co_captain(&self, ttr_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM ttr_co_captains WHERE ttr_id = $1 AND user_id = $2")
            .bind(ttr_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn is_co_captain(&self, ttr_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM ttr_co_captains WHERE ttr_id = $1 AND user_id = $2)",
        )
        .bind(ttr_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn list_co_captains(&self, ttr_id: Uuid) -> Result<Vec<CoCaptain>, AppError> {
        Ok(sqlx::query_as::<_, CoCaptain>(
            "SELECT ttr_id, user_id, assigned_at FROM ttr_co_captains
             WHERE ttr_id = $1 ORDER BY assigned_at",
        )
        .bind(ttr_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn seat_player(
        &self,
        ttr_id: Uuid,
        user_id: Uuid,
        status: PlayerStatus,
    ) -> Result<SeatOutcome, AppError> {
        let mut tx = self.db.begin().await?;

        // Row lock serializes concurrent joins against the same roster
        let max: Option<(i32,)> = sqlx::query_as("SELECT max_players FROM ttrs WHERE id = $1 FOR UPDATE")
            .bind(ttr_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((max_players,)) = max else {
            return Ok(SeatOutcome::TtrMissing);
        };

        let (players,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ttr_players WHERE ttr_id = $1")
            .bind(ttr_id)
            .fetch_one(&mut *tx)
            .await?;
        if players >= i64::from(max_players) {
            return Ok(SeatOutcome::Full);
        }

        let inserted = sqlx::query(
            "INSERT INTO ttr_players (ttr_id, user_id, status) VALUES ($1, $2, $3)
             ON CONFLICT (ttr_id, user_id) DO NOTHING",
        )
        .bind(ttr_id)
        .bind(user_id)
        .bind(status)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            return Ok(SeatOutcome::AlreadySeated);
        }

        tx.commit().await?;
        Ok(SeatOutcome::Seated)
    }

    async fn remove_player(&self, ttr_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM ttr_players WHERE ttr_id = $1 AND user_id = $2")
            .bind(ttr_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_player_status(
        &self,
        ttr_id: Uuid,
        user_id: Uuid,
        status: PlayerStatus,
    ) -> Result<bool, AppError> {
        let res = sqlx::query("UPDATE ttr_players SET status = $3 WHERE ttr_id = $1 AND user_id = $2")
            .bind(ttr_id)
            .bind(user_id)
            .bind(status)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_players(&self, ttr_id: Uuid) -> Result<Vec<Player>, AppError> {
        Ok(sqlx::query_as::<_, Player>(
            "SELECT ttr_id, user_id, status, joined_at FROM ttr_players
             WHERE ttr_id = $1 ORDER BY joined_at",
        )
        .bind(ttr_id)
        .fetch_all(&self.db)
        .await?)
    }
}

impl InvitationRepository for PgRepository {
    async fn create_invitation(&self, invitation: NewInvitation) -> Result<Invitation, AppError> {
        sqlx::query_as::<_, Invitation>(&format!(
            "INSERT INTO invitations (ttr_id, inviter_id, invitee_id, message)
             VALUES ($1, $2, $3, $4)
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(invitation.ttr_id)
        .bind(invitation.inviter_id)
        .bind(invitation.invitee_id)
        .bind(&invitation.message)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_violation_as(e, "Pending invitation already exists for this user"))
    }

    async fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, AppError> {
        Ok(sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn find_pending_invitation(
        &self,
        ttr_id: Uuid,
        invitee_id: Uuid,
    ) -> Result<Option<Invitation>, AppError> {
        Ok(sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
             WHERE ttr_id = $1 AND invitee_id = $2 AND status = 'PENDING'"
        ))
        .bind(ttr_id)
        .bind(invitee_id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn list_received(&self, invitee_id: Uuid) -> Result<Vec<Invitation>, AppError> {
        Ok(sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
             WHERE invitee_id = $1 ORDER BY created_at DESC"
        ))
        .bind(invitee_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn list_sent(&self, inviter_id: Uuid) -> Result<Vec<Invitation>, AppError> {
        Ok(sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
             WHERE inviter_id = $1 ORDER BY created_at DESC"
        ))
        .bind(inviter_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn resolve_invitation(
        &self,
        id: Uuid,
        status: InvitationStatus,
        responded_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Invitation>, AppError> {
        Ok(sqlx::query_as::<_, Invitation>(&format!(
            "UPDATE invitations SET status = $2, responded_at = COALESCE($3, responded_at)
             WHERE id = $1 AND status = 'PENDING'
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(responded_at)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn accept_invitation(
        &self,
        id: Uuid,
        responded_at: DateTime<Utc>,
    ) -> Result<AcceptOutcome, AppError> {
        let ttr_id: Option<(Uuid,)> = sqlx::query_as("SELECT ttr_id FROM invitations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        let Some((ttr_id,)) = ttr_id else {
            return Err(AppError::NotFound("Invitation not found".into()));
        };

        let mut tx = self.db.begin().await?;

        // Lock order: TTR, then invitation. Deleting a TTR cascades in the same order.
        let max: Option<(i32,)> = sqlx::query_as("SELECT max_players FROM ttrs WHERE id = $1 FOR UPDATE")
            .bind(ttr_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((max_players,)) = max else {
            return Ok(AcceptOutcome::TtrMissing);
        };

        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(invitation) = invitation else {
            return Err(AppError::NotFound("Invitation not found".into()));
        };
        if invitation.status != InvitationStatus::Pending {
            return Ok(AcceptOutcome::NotPending);
        }

        let (already_seated,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM ttr_players WHERE ttr_id = $1 AND user_id = $2)",
        )
        .bind(invitation.ttr_id)
        .bind(invitation.invitee_id)
        .fetch_one(&mut *tx)
        .await?;

        if !already_seated {
            let (players,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ttr_players WHERE ttr_id = $1")
                .bind(invitation.ttr_id)
                .fetch_one(&mut *tx)
                .await?;
            if players >= i64::from(max_players) {
                return Ok(AcceptOutcome::Full);
            }

            sqlx::query("INSERT INTO ttr_players (ttr_id, user_id, status) VALUES ($1, $2, 'CONFIRMED')")
                .bind(invitation.ttr_id)
                .bind(invitation.invitee_id)
                .execute(&mut *tx)
                .await?;
        }

        let accepted = sqlx::query_as::<_, Invitation>(&format!(
            "UPDATE invitations SET status = 'YES', responded_at = $2
             WHERE id = $1
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(id)
        .bind(responded_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(AcceptOutcome::Accepted(accepted))
    }
}

impl NotificationRepository for PgRepository {
    async fn insert_notification(&self, n: &NewNotification) -> Result<Notification, AppError> {
        Ok(sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, kind, title, body, target_type, target_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, user_id, kind, title, body, target_type, target_id, is_read, created_at, read_at",
        )
        .bind(n.user_id)
        .bind(n.kind)
        .bind(&n.title)
        .bind(&n.body)
        .bind(&n.target_type)
        .bind(n.target_id)
        .fetch_one(&self.db)
        .await?)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        Ok(sqlx::query_as::<_, Notification>(
            "SELECT id, user_id, kind, title, body, target_type, target_id, is_read, created_at, read_at
             FROM notifications
             WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let res = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = COALESCE(read_at, $3)
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64, AppError> {
        let res = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = $2
             WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected())
    }
}
