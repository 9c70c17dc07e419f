use chrono::Utc;
use tracing::{Span, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::ttr::{
    NewTtr, Player, PlayerStatus, Ttr, TtrDetails, TtrPatch, TtrScope, TtrStatus,
};
use crate::repository::{SeatOutcome, TtrRepository, TtrUpdate, UserRepository};

use super::notification::NotificationSink;
use super::{can_manage, is_captain, load_ttr, page};

fn validate_course_name(name: &str) -> Result<(), AppError> {
    let len = name.trim().chars().count();
    if !(2..=255).contains(&len) {
        return Err(AppError::InvalidArgument(
            "course_name must be between 2 and 255 characters".into(),
        ));
    }
    Ok(())
}

fn validate_max_players(max_players: i32) -> Result<(), AppError> {
    if max_players <= 0 {
        return Err(AppError::InvalidArgument(
            "max_players must be greater than 0".into(),
        ));
    }
    Ok(())
}

/// Roster manager: TTR lifecycle, co-captains and players.
pub struct TtrService<R, N> {
    repo: R,
    notifier: N,
    span: Span,
}

impl<R, N> TtrService<R, N>
where
    R: TtrRepository + UserRepository,
    N: NotificationSink,
{
    pub fn new(repo: R, notifier: N, span: Span) -> Self {
        Self {
            repo,
            notifier,
            span,
        }
    }

    async fn details(&self, ttr: Ttr) -> Result<TtrDetails, AppError> {
        let co_captains = self.repo.list_co_captains(ttr.id).await?;
        let players = self.repo.list_players(ttr.id).await?;
        Ok(TtrDetails {
            ttr,
            co_captains,
            players,
        })
    }

    async fn require_manager(&self, ttr: &Ttr, actor: Uuid) -> Result<(), AppError> {
        if !can_manage(&self.repo, ttr, actor).await? {
            return Err(AppError::Unauthorized(
                "Only the captain or a co-captain can manage this TTR".into(),
            ));
        }
        Ok(())
    }

    fn require_captain(ttr: &Ttr, actor: Uuid, action: &str) -> Result<(), AppError> {
        if !is_captain(ttr, actor) {
            return Err(AppError::Unauthorized(format!("Only the captain can {action}")));
        }
        Ok(())
    }

    pub async fn create(&self, actor: Uuid, ttr: NewTtr) -> Result<TtrDetails, AppError> {
        validate_max_players(ttr.max_players)?;
        validate_course_name(&ttr.course_name)?;
        if !self.repo.user_exists(actor).await? {
            return Err(AppError::NotFound("User not found".into()));
        }

        let created = self.repo.create_ttr(actor, ttr).await?;
        info!(parent: &self.span, ttr_id = %created.id, captain = %actor, "TTR created");
        self.details(created).await
    }

    pub async fn get(&self, id: Uuid) -> Result<TtrDetails, AppError> {
        let ttr = load_ttr(&self.repo, id).await?;
        self.details(ttr).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        actor: Uuid,
        patch: TtrPatch,
    ) -> Result<TtrDetails, AppError> {
        let ttr = load_ttr(&self.repo, id).await?;
        self.require_manager(&ttr, actor).await?;

        if let Some(max_players) = patch.max_players {
            validate_max_players(max_players)?;
        }
        if let Some(name) = &patch.course_name {
            validate_course_name(name)?;
        }

        match self.repo.update_ttr(id, &patch).await? {
            TtrUpdate::Updated(updated) => {
                info!(parent: &self.span, ttr_id = %id, actor = %actor, "TTR updated");
                self.details(updated).await
            }
            TtrUpdate::Missing => Err(AppError::NotFound("TTR not found".into())),
            TtrUpdate::BelowRoster { players } => Err(AppError::InvalidArgument(format!(
                "max_players cannot be less than the current number of players ({players})"
            ))),
        }
    }

    pub async fn delete(&self, id: Uuid, actor: Uuid) -> Result<(), AppError> {
        let ttr = load_ttr(&self.repo, id).await?;
        Self::require_captain(&ttr, actor, "delete the TTR")?;

        if !self.repo.delete_ttr(id).await? {
            return Err(AppError::NotFound("TTR not found".into()));
        }
        info!(parent: &self.span, ttr_id = %id, "TTR deleted");
        Ok(())
    }

    pub async fn search(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
        status: Option<&str>,
    ) -> Result<Vec<Ttr>, AppError> {
        let status = status.map(str::parse::<TtrStatus>).transpose()?;
        let (limit, offset) = page(limit, offset);
        self.repo.list_ttrs(limit, offset, status).await
    }

    pub async fn my_ttrs(&self, actor: Uuid, scope: TtrScope) -> Result<Vec<Ttr>, AppError> {
        self.repo
            .list_ttrs_for_user(actor, scope, Utc::now().date_naive())
            .await
    }

    pub async fn add_co_captain(
        &self,
        id: Uuid,
        actor: Uuid,
        target: Uuid,
    ) -> Result<TtrDetails, AppError> {
        let ttr = load_ttr(&self.repo, id).await?;
        Self::require_captain(&ttr, actor, "add co-captains")?;
        if !self.repo.user_exists(target).await? {
            return Err(AppError::NotFound("User not found".into()));
        }

        self.repo.add_co_captain(id, target).await?;
        info!(parent: &self.span, ttr_id = %id, co_captain = %target, "co-captain added");

        let notification = NewNotification {
            user_id: target,
            kind: NotificationKind::CoCaptainAdded,
            title: "Co-captain Assignment".into(),
            body: format!(
                "You have been made a co-captain for the tee time at {}",
                ttr.course_name
            ),
            target_type: Some("ttr".into()),
            target_id: Some(id),
        };
        if let Err(e) = self.notifier.notify(notification) {
            warn!(parent: &self.span, user_id = %target, "failed to queue notification: {e}");
        }

        self.details(ttr).await
    }

    pub async fn remove_co_captain(
        &self,
        id: Uuid,
        actor: Uuid,
        target: Uuid,
    ) -> Result<(), AppError> {
        let ttr = load_ttr(&self.repo, id).await?;
        Self::require_captain(&ttr, actor, "remove co-captains")?;

        if !self.repo.remove_co_captain(id, target).await? {
            return Err(AppError::NotFound("User is not a co-captain".into()));
        }
        info!(parent: &self.span, ttr_id = %id, co_captain = %target, "co-captain removed");
        Ok(())
    }

    pub async fn join(&self, id: Uuid, actor: Uuid) -> Result<TtrDetails, AppError> {
        match self.repo.seat_player(id, actor, PlayerStatus::Confirmed).await? {
            SeatOutcome::Seated => {
                info!(parent: &self.span, ttr_id = %id, user_id = %actor, "player joined");
                self.get(id).await
            }
            SeatOutcome::TtrMissing => Err(AppError::NotFound("TTR not found".into())),
            SeatOutcome::Full => Err(AppError::Full("TTR is full".into())),
            SeatOutcome::AlreadySeated => {
                Err(AppError::AlreadyExists("User is already a player".into()))
            }
        }
    }

    pub async fn leave(&self, id: Uuid, actor: Uuid) -> Result<(), AppError> {
        let ttr = load_ttr(&self.repo, id).await?;
        if is_captain(&ttr, actor) {
            return Err(AppError::InvalidOperation("Captain cannot leave the TTR".into()));
        }

        if !self.repo.remove_player(id, actor).await? {
            return Err(AppError::NotFound("User is not a player".into()));
        }
        info!(parent: &self.span, ttr_id = %id, user_id = %actor, "player left");
        Ok(())
    }

    pub async fn update_player_status(
        &self,
        id: Uuid,
        actor: Uuid,
        target: Uuid,
        status: &str,
    ) -> Result<Vec<Player>, AppError> {
        let ttr = load_ttr(&self.repo, id).await?;
        self.require_manager(&ttr, actor).await?;
        let status: PlayerStatus = status.parse()?;

        if !self.repo.set_player_status(id, target, status).await? {
            return Err(AppError::NotFound("User is not a player".into()));
        }
        info!(parent: &self.span, ttr_id = %id, user_id = %target, ?status, "player status changed");
        self.repo.list_players(id).await
    }

    pub async fn players(&self, id: Uuid) -> Result<Vec<Player>, AppError> {
        load_ttr(&self.repo, id).await?;
        self.repo.list_players(id).await
    }
}
