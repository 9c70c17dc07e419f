use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{Span, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::{NewNotification, Notification};
use crate::repository::NotificationRepository;

use super::page;

/// Best-effort, at-most-once delivery. `notify` never waits; an `Err` means the
/// notification was dropped and callers only log it.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: NewNotification) -> Result<(), AppError>;
}

/// Queues notifications for [`spawn_worker`] to persist.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<NewNotification>,
}

impl ChannelNotifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NewNotification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: NewNotification) -> Result<(), AppError> {
        self.tx.try_send(notification).map_err(|e| match e {
            TrySendError::Full(_) => AppError::Internal("Notification queue is full".into()),
            TrySendError::Closed(_) => AppError::Internal("Notification queue is closed".into()),
        })
    }
}

/// Drains the queue into the notifications table until every sender is dropped.
pub fn spawn_worker<R>(repo: R, mut rx: mpsc::Receiver<NewNotification>, span: Span) -> JoinHandle<()>
where
    R: NotificationRepository + 'static,
{
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            match repo.insert_notification(&notification).await {
                Ok(stored) => info!(
                    parent: &span,
                    notification_id = %stored.id,
                    user_id = %stored.user_id,
                    "notification stored"
                ),
                Err(e) => warn!(
                    parent: &span,
                    user_id = %notification.user_id,
                    "failed to store notification: {e}"
                ),
            }
        }
        info!(parent: &span, "notification worker stopped");
    })
}

pub struct NotificationService<R> {
    repo: R,
    span: Span,
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repo: R, span: Span) -> Self {
        Self { repo, span }
    }

    pub async fn list(
        &self,
        actor: Uuid,
        unread_only: bool,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Notification>, AppError> {
        let (limit, offset) = page(limit, offset);
        self.repo
            .list_notifications(actor, unread_only, limit, offset)
            .await
    }

    pub async fn mark_read(&self, actor: Uuid, id: Uuid) -> Result<(), AppError> {
        if !self.repo.mark_notification_read(actor, id, Utc::now()).await? {
            return Err(AppError::NotFound("Notification not found".into()));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, actor: Uuid) -> Result<u64, AppError> {
        let marked = self.repo.mark_all_notifications_read(actor, Utc::now()).await?;
        info!(parent: &self.span, user_id = %actor, marked, "notifications marked read");
        Ok(marked)
    }
}
