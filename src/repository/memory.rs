//! In-process store backing the service tests.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::invitation::{Invitation, InvitationStatus, NewInvitation};
use crate::models::notification::{NewNotification, Notification};
use crate::models::session::RefreshToken;
use crate::models::ttr::{CoCaptain, NewTtr, Player, PlayerStatus, Ttr, TtrPatch, TtrScope, TtrStatus};
use crate::models::user::{NewUser, User};

use super::{
    AcceptOutcome, InvitationRepository, NotificationRepository, SeatOutcome, SessionRepository,
    TtrRepository, TtrUpdate, UserRepository,
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    tokens: Vec<RefreshToken>,
    ttrs: Vec<Ttr>,
    co_captains: Vec<CoCaptain>,
    players: Vec<Player>,
    invitations: Vec<Invitation>,
    notifications: Vec<Notification>,
}

impl State {
    fn live_user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id && u.deleted_at.is_none())
    }

    fn roster_size(&self, ttr_id: Uuid) -> i64 {
        self.players.iter().filter(|p| p.ttr_id == ttr_id).count() as i64
    }

    fn is_player(&self, ttr_id: Uuid, user_id: Uuid) -> bool {
        self.players.iter().any(|p| p.ttr_id == ttr_id && p.user_id == user_id)
    }

    fn push_player(&mut self, ttr_id: Uuid, user_id: Uuid, status: PlayerStatus) {
        self.players.push(Player {
            ttr_id,
            user_id,
            status,
            joined_at: Utc::now(),
        });
    }
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<State>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn invitation_count(&self) -> usize {
        self.lock().invitations.len()
    }

    pub fn notification_count(&self) -> usize {
        self.lock().notifications.len()
    }
}

impl UserRepository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.lock();
        if state
            .users
            .iter()
            .any(|u| u.email == user.email && u.deleted_at.is_none())
        {
            return Err(AppError::AlreadyExists(
                "User with this email already exists".into(),
            ));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            handicap: None,
            phone: None,
            avatar_key: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock().live_user(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }

    async fn user_exists(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock().live_user(id).is_some())
    }

    async fn update_user(&self, user: &User) -> Result<User, AppError> {
        let mut state = self.lock();
        let stored = state
            .users
            .iter_mut()
            .find(|u| u.id == user.id && u.deleted_at.is_none())
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        stored.password_hash = user.password_hash.clone();
        stored.first_name = user.first_name.clone();
        stored.last_name = user.last_name.clone();
        stored.handicap = user.handicap;
        stored.phone = user.phone.clone();
        stored.avatar_key = user.avatar_key.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn search_users(&self, query: &str, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let needle = query.to_lowercase();
        let state = self.lock();
        let mut found: Vec<User> = state
            .users
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .filter(|u| {
                u.first_name.to_lowercase().contains(&needle)
                    || u.last_name.to_lowercase().contains(&needle)
                    || u.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(found
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn soft_delete_user(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.lock();
        if let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
        {
            user.deleted_at = Some(at);
        }
        Ok(())
    }
}

impl SessionRepository for MemoryRepository {
    async fn insert_refresh_token(
        &self,
        user_id: Uuid,
        secret_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        let token = RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            secret_hash: secret_hash.to_string(),
            expires_at,
            revoked: false,
            created_at: Utc::now(),
        };
        self.lock().tokens.push(token.clone());
        Ok(token)
    }

    async fn find_refresh_token(&self, id: Uuid) -> Result<Option<RefreshToken>, AppError> {
        Ok(self.lock().tokens.iter().find(|t| t.id == id).cloned())
    }

    async fn revoke_user_tokens(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut revoked = 0;
        for token in self
            .lock()
            .tokens
            .iter_mut()
            .filter(|t| t.user_id == user_id && !t.revoked)
        {
            token.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.lock();
        let before = state.tokens.len();
        state.tokens.retain(|t| t.expires_at >= now);
        Ok((before - state.tokens.len()) as u64)
    }
}

impl TtrRepository for MemoryRepository {
    async fn create_ttr(&self, captain: Uuid, ttr: NewTtr) -> Result<Ttr, AppError> {
        let now = Utc::now();
        let created = Ttr {
            id: Uuid::new_v4(),
            course_name: ttr.course_name,
            course_location: ttr.course_location,
            tee_date: ttr.tee_date,
            tee_time: ttr.tee_time,
            max_players: ttr.max_players,
            created_by: captain,
            captain_id: captain,
            status: TtrStatus::Open,
            notes: ttr.notes,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.lock();
        state.ttrs.push(created.clone());
        state.push_player(created.id, captain, PlayerStatus::Confirmed);
        Ok(created)
    }

    async fn find_ttr(&self, id: Uuid) -> Result<Option<Ttr>, AppError> {
        Ok(self.lock().ttrs.iter().find(|t| t.id == id).cloned())
    }

    async fn list_ttrs(
        &self,
        limit: i64,
        offset: i64,
        status: Option<TtrStatus>,
    ) -> Result<Vec<Ttr>, AppError> {
        let mut found: Vec<Ttr> = self
            .lock()
            .ttrs
            .iter()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        found.sort_by_key(|t| (t.tee_date, t.tee_time));
        Ok(found
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_ttrs_for_user(
        &self,
        user_id: Uuid,
        scope: TtrScope,
        today: NaiveDate,
    ) -> Result<Vec<Ttr>, AppError> {
        let state = self.lock();
        let mut found: Vec<Ttr> = state
            .ttrs
            .iter()
            .filter(|t| match scope {
                TtrScope::Upcoming => t.tee_date >= today,
                TtrScope::Past => t.tee_date < today,
            })
            .filter(|t| {
                t.captain_id == user_id
                    || state.is_player(t.id, user_id)
                    || state
                        .co_captains
                        .iter()
                        .any(|c| c.ttr_id == t.id && c.user_id == user_id)
            })
            .cloned()
            .collect();
        found.sort_by_key(|t| (t.tee_date, t.tee_time));
        if scope == TtrScope::Past {
            found.reverse();
        }
        Ok(found)
    }

    async fn update_ttr(&self, id: Uuid, patch: &TtrPatch) -> Result<TtrUpdate, AppError> {
        let mut state = self.lock();
        let players = state.roster_size(id);
        let Some(ttr) = state.ttrs.iter_mut().find(|t| t.id == id) else {
            return Ok(TtrUpdate::Missing);
        };
        if let Some(max_players) = patch.max_players {
            if i64::from(max_players) < players {
                return Ok(TtrUpdate::BelowRoster { players });
            }
            ttr.max_players = max_players;
        }
        if let Some(course_name) = &patch.course_name {
            ttr.course_name = course_name.clone();
        }
        if let Some(location) = &patch.course_location {
            ttr.course_location = Some(location.clone());
        }
        if let Some(date) = patch.tee_date {
            ttr.tee_date = date;
        }
        if let Some(time) = patch.tee_time {
            ttr.tee_time = time;
        }
        if let Some(status) = patch.status {
            ttr.status = status;
        }
        if let Some(notes) = &patch.notes {
            ttr.notes = Some(notes.clone());
        }
        ttr.updated_at = Utc::now();
        Ok(TtrUpdate::Updated(ttr.clone()))
    }

    async fn delete_ttr(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.lock();
        let before = state.ttrs.len();
        state.ttrs.retain(|t| t.id != id);
        if state.ttrs.len() == before {
            return Ok(false);
        }
        state.co_captains.retain(|c| c.ttr_id != id);
        state.players.retain(|p| p.ttr_id != id);
        state.invitations.retain(|i| i.ttr_id != id);
        Ok(true)
    }

    async fn add_co_captain(&self, ttr_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let mut state = self.lock();
        if state
            .co_captains
            .iter()
            .any(|c| c.ttr_id == ttr_id && c.user_id == user_id)
        {
            return Err(AppError::AlreadyExists("User is already a co-captain".into()));
        }
        state.co_captains.push(CoCaptain {
            ttr_id,
            user_id,
            assigned_at: Utc::now(),
        });
        Ok(())
    }

    async fn remove_co_captain(&self, ttr_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.lock();
        let before = state.co_captains.len();
        state
            .co_captains
            .retain(|c| !(c.ttr_id == ttr_id && c.user_id == user_id));
        Ok(state.co_captains.len() < before)
    }

    async fn is_co_captain(&self, ttr_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .lock()
            .co_captains
            .iter()
            .any(|c| c.ttr_id == ttr_id && c.user_id == user_id))
    }

    async fn list_co_captains(&self, ttr_id: Uuid) -> Result<Vec<CoCaptain>, AppError> {
        Ok(self
            .lock()
            .co_captains
            .iter()
            .filter(|c| c.ttr_id == ttr_id)
            .cloned()
            .collect())
    }

    async fn seat_player(
        &self,
        ttr_id: Uuid,
        user_id: Uuid,
        status: PlayerStatus,
    ) -> Result<SeatOutcome, AppError> {
        let mut state = self.lock();
        let Some(max_players) = state.ttrs.iter().find(|t| t.id == ttr_id).map(|t| t.max_players) else {
            return Ok(SeatOutcome::TtrMissing);
        };
        if state.roster_size(ttr_id) >= i64::from(max_players) {
            return Ok(SeatOutcome::Full);
        }
        if state.is_player(ttr_id, user_id) {
            return Ok(SeatOutcome::AlreadySeated);
        }
        state.push_player(ttr_id, user_id, status);
        Ok(SeatOutcome::Seated)
    }

    async fn remove_player(&self, ttr_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.lock();
        let before = state.players.len();
        state
            .players
            .retain(|p| !(p.ttr_id == ttr_id && p.user_id == user_id));
        Ok(state.players.len() < before)
    }

    async fn set_player_status(
        &self,
        ttr_id: Uuid,
        user_id: Uuid,
        status: PlayerStatus,
    ) -> Result<bool, AppError> {
        let mut state = self.lock();
        match state
            .players
            .iter_mut()
            .find(|p| p.ttr_id == ttr_id && p.user_id == user_id)
        {
            Some(player) => {
                player.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_players(&self, ttr_id: Uuid) -> Result<Vec<Player>, AppError> {
        Ok(self
            .lock()
            .players
            .iter()
            .filter(|p| p.ttr_id == ttr_id)
            .cloned()
            .collect())
    }
}

impl InvitationRepository for MemoryRepository {
    async fn create_invitation(&self, invitation: NewInvitation) -> Result<Invitation, AppError> {
        let mut state = self.lock();
        if state.invitations.iter().any(|i| {
            i.ttr_id == invitation.ttr_id
                && i.invitee_id == invitation.invitee_id
                && i.status == InvitationStatus::Pending
        }) {
            return Err(AppError::AlreadyExists(
                "Pending invitation already exists for this user".into(),
            ));
        }
        let created = Invitation {
            id: Uuid::new_v4(),
            ttr_id: invitation.ttr_id,
            inviter_id: invitation.inviter_id,
            invitee_id: invitation.invitee_id,
            status: InvitationStatus::Pending,
            message: invitation.message,
            created_at: Utc::now(),
            responded_at: None,
        };
        state.invitations.push(created.clone());
        Ok(created)
    }

    async fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, AppError> {
        Ok(self.lock().invitations.iter().find(|i| i.id == id).cloned())
    }

    async fn find_pending_invitation(
        &self,
        ttr_id: Uuid,
        invitee_id: Uuid,
    ) -> Result<Option<Invitation>, AppError> {
        Ok(self
            .lock()
            .invitations
            .iter()
            .find(|i| {
                i.ttr_id == ttr_id && i.invitee_id == invitee_id && i.status == InvitationStatus::Pending
            })
            .cloned())
    }

    async fn list_received(&self, invitee_id: Uuid) -> Result<Vec<Invitation>, AppError> {
        let mut found: Vec<Invitation> = self
            .lock()
            .invitations
            .iter()
            .filter(|i| i.invitee_id == invitee_id)
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }

    async fn list_sent(&self, inviter_id: Uuid) -> Result<Vec<Invitation>, AppError> {
        let mut found: Vec<Invitation> = self
            .lock()
            .invitations
            .iter()
            .filter(|i| i.inviter_id == inviter_id)
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }

    async fn resolve_invitation(
        &self,
        id: Uuid,
        status: InvitationStatus,
        responded_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Invitation>, AppError> {
        let mut state = self.lock();
        let Some(invitation) = state
            .invitations
            .iter_mut()
            .find(|i| i.id == id && i.status == InvitationStatus::Pending)
        else {
            return Ok(None);
        };
        invitation.status = status;
        if responded_at.is_some() {
            invitation.responded_at = responded_at;
        }
        Ok(Some(invitation.clone()))
    }

    async fn accept_invitation(
        &self,
        id: Uuid,
        responded_at: DateTime<Utc>,
    ) -> Result<AcceptOutcome, AppError> {
        let mut state = self.lock();
        let Some(invitation) = state.invitations.iter().find(|i| i.id == id).cloned() else {
            return Err(AppError::NotFound("Invitation not found".into()));
        };
        if invitation.status != InvitationStatus::Pending {
            return Ok(AcceptOutcome::NotPending);
        }
        let Some(max_players) = state
            .ttrs
            .iter()
            .find(|t| t.id == invitation.ttr_id)
            .map(|t| t.max_players)
        else {
            return Ok(AcceptOutcome::TtrMissing);
        };

        if !state.is_player(invitation.ttr_id, invitation.invitee_id) {
            if state.roster_size(invitation.ttr_id) >= i64::from(max_players) {
                return Ok(AcceptOutcome::Full);
            }
            state.push_player(invitation.ttr_id, invitation.invitee_id, PlayerStatus::Confirmed);
        }

        let Some(stored) = state.invitations.iter_mut().find(|i| i.id == id) else {
            return Err(AppError::NotFound("Invitation not found".into()));
        };
        stored.status = InvitationStatus::Yes;
        stored.responded_at = Some(responded_at);
        Ok(AcceptOutcome::Accepted(stored.clone()))
    }
}

impl NotificationRepository for MemoryRepository {
    async fn insert_notification(&self, n: &NewNotification) -> Result<Notification, AppError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: n.user_id,
            kind: n.kind,
            title: n.title.clone(),
            body: n.body.clone(),
            target_type: n.target_type.clone(),
            target_id: n.target_id,
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
        };
        self.lock().notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && !(unread_only && n.is_read))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut state = self.lock();
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        {
            Some(n) => {
                n.is_read = true;
                n.read_at.get_or_insert(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64, AppError> {
        let mut marked = 0;
        for n in self
            .lock()
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            n.is_read = true;
            n.read_at = Some(at);
            marked += 1;
        }
        Ok(marked)
    }
}
