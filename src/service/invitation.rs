use chrono::Utc;
use tracing::{Span, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::invitation::{Invitation, InvitationBox, InvitationStatus, NewInvitation};
use crate::models::notification::{NewNotification, NotificationKind};
use crate::repository::{AcceptOutcome, InvitationRepository, TtrRepository, UserRepository};

use super::notification::NotificationSink;
use super::{can_manage, load_ttr};

pub struct InvitationService<R, N> {
    repo: R,
    notifier: N,
    span: Span,
}

impl<R, N> InvitationService<R, N>
where
    R: InvitationRepository + TtrRepository + UserRepository,
    N: NotificationSink,
{
    pub fn new(repo: R, notifier: N, span: Span) -> Self {
        Self {
            repo,
            notifier,
            span,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Invitation, AppError> {
        self.repo
            .find_invitation(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invitation not found".into()))
    }

    /// Checks run in a fixed order and the first failure wins.
    pub async fn create(
        &self,
        ttr_id: Uuid,
        inviter: Uuid,
        invitee: Uuid,
        message: Option<String>,
    ) -> Result<Invitation, AppError> {
        let ttr = load_ttr(&self.repo, ttr_id).await?;
        if !can_manage(&self.repo, &ttr, inviter).await? {
            return Err(AppError::Unauthorized(
                "Only the captain or a co-captain can send invitations".into(),
            ));
        }
        if !self.repo.user_exists(invitee).await? {
            return Err(AppError::NotFound("Invitee not found".into()));
        }

        let players = self.repo.list_players(ttr_id).await?;
        if players.len() as i64 >= i64::from(ttr.max_players) {
            return Err(AppError::Full("TTR is full".into()));
        }
        if players.iter().any(|p| p.user_id == invitee) {
            return Err(AppError::AlreadyExists("User is already a player".into()));
        }
        if self
            .repo
            .find_pending_invitation(ttr_id, invitee)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyExists(
                "Pending invitation already exists for this user".into(),
            ));
        }

        // The unique index still catches a concurrent duplicate here.
        let invitation = self
            .repo
            .create_invitation(NewInvitation {
                ttr_id,
                inviter_id: inviter,
                invitee_id: invitee,
                message,
            })
            .await?;
        info!(
            parent: &self.span,
            invitation_id = %invitation.id,
            ttr_id = %ttr_id,
            invitee = %invitee,
            "invitation created"
        );

        let notification = NewNotification {
            user_id: invitee,
            kind: NotificationKind::InvitationReceived,
            title: "New TTR Invitation".into(),
            body: format!(
                "You have been invited to join a tee time at {}",
                ttr.course_name
            ),
            target_type: Some("invitation".into()),
            target_id: Some(invitation.id),
        };
        if let Err(e) = self.notifier.notify(notification) {
            warn!(parent: &self.span, invitation_id = %invitation.id, "failed to queue notification: {e}");
        }

        Ok(invitation)
    }

    pub async fn respond(&self, id: Uuid, actor: Uuid, status: &str) -> Result<Invitation, AppError> {
        let status: InvitationStatus = status.parse()?;
        if !status.is_response() {
            return Err(AppError::InvalidArgument(
                "status must be one of YES, NO, MAYBE".into(),
            ));
        }

        let invitation = self.load(id).await?;
        if invitation.invitee_id != actor {
            return Err(AppError::Unauthorized(
                "Only the invitee can respond to this invitation".into(),
            ));
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(already_responded());
        }

        let now = Utc::now();
        let updated = if status == InvitationStatus::Yes {
            match self.repo.accept_invitation(id, now).await? {
                AcceptOutcome::Accepted(updated) => updated,
                AcceptOutcome::NotPending => return Err(already_responded()),
                AcceptOutcome::Full => return Err(AppError::Full("TTR is full".into())),
                AcceptOutcome::TtrMissing => {
                    return Err(AppError::NotFound("TTR not found".into()));
                }
            }
        } else {
            self.repo
                .resolve_invitation(id, status, Some(now))
                .await?
                .ok_or_else(already_responded)?
        };

        info!(parent: &self.span, invitation_id = %id, status = ?updated.status, "invitation answered");
        Ok(updated)
    }

    pub async fn cancel(&self, id: Uuid, actor: Uuid) -> Result<(), AppError> {
        let invitation = self.load(id).await?;
        if invitation.inviter_id != actor {
            return Err(AppError::Unauthorized(
                "Only the inviter can cancel the invitation".into(),
            ));
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(not_cancelable());
        }

        self.repo
            .resolve_invitation(id, InvitationStatus::Canceled, None)
            .await?
            .ok_or_else(not_cancelable)?;
        info!(parent: &self.span, invitation_id = %id, "invitation canceled");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Invitation, AppError> {
        self.load(id).await
    }

    pub async fn list(&self, actor: Uuid, which: InvitationBox) -> Result<Vec<Invitation>, AppError> {
        match which {
            InvitationBox::Received => self.repo.list_received(actor).await,
            InvitationBox::Sent => self.repo.list_sent(actor).await,
        }
    }
}

fn already_responded() -> AppError {
    AppError::InvalidOperation("Invitation has already been responded to".into())
}

fn not_cancelable() -> AppError {
    AppError::InvalidOperation("Only pending invitations can be canceled".into())
}
