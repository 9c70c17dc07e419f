use chrono::Utc;
use tracing::{Span, info};
use uuid::Uuid;

use crate::auth::password;
use crate::avatar;
use crate::error::AppError;
use crate::models::user::{UpdateProfileRequest, User};
use crate::repository::{SessionRepository, UserRepository};
use crate::storage::StorageBackend;

use super::page;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::InvalidArgument("A valid email is required".into())),
    }
}

pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidArgument(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_name(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if !(2..=100).contains(&value.chars().count()) {
        return Err(AppError::InvalidArgument(format!(
            "{field} must be between 2 and 100 characters"
        )));
    }
    Ok(value.to_string())
}

pub struct UserService<R> {
    repo: R,
    storage: StorageBackend,
    span: Span,
}

impl<R> UserService<R>
where
    R: UserRepository + SessionRepository,
{
    pub fn new(repo: R, storage: StorageBackend, span: Span) -> Self {
        Self {
            repo,
            storage,
            span,
        }
    }

    pub fn storage(&self) -> &StorageBackend {
        &self.storage
    }

    pub async fn get(&self, id: Uuid) -> Result<User, AppError> {
        self.repo
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn update_profile(
        &self,
        actor: Uuid,
        changes: UpdateProfileRequest,
    ) -> Result<User, AppError> {
        let mut user = self.get(actor).await?;

        if let Some(first_name) = &changes.first_name {
            user.first_name = validate_name("first_name", first_name)?;
        }
        if let Some(last_name) = &changes.last_name {
            user.last_name = validate_name("last_name", last_name)?;
        }
        if let Some(handicap) = changes.handicap {
            if !(0.0..=54.0).contains(&handicap) {
                return Err(AppError::InvalidArgument(
                    "handicap must be between 0 and 54".into(),
                ));
            }
            user.handicap = Some(handicap);
        }
        if let Some(phone) = changes.phone {
            if phone.chars().count() > 20 {
                return Err(AppError::InvalidArgument(
                    "phone must be at most 20 characters".into(),
                ));
            }
            user.phone = Some(phone);
        }

        self.repo.update_user(&user).await
    }

    pub async fn change_password(
        &self,
        actor: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let mut user = self.get(actor).await?;
        if !password::verify_password(old_password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }
        validate_password(new_password)?;

        user.password_hash = password::hash_password(new_password)?;
        self.repo.update_user(&user).await?;
        let revoked = self.repo.revoke_user_tokens(actor).await?;
        info!(parent: &self.span, user_id = %actor, revoked, "password changed");
        Ok(())
    }

    pub async fn upload_avatar(
        &self,
        actor: Uuid,
        bytes: Vec<u8>,
        content_type: String,
    ) -> Result<User, AppError> {
        let mut user = self.get(actor).await?;

        let webp = tokio::task::spawn_blocking(move || avatar::process(&bytes, &content_type))
            .await
            .map_err(|e| AppError::Internal(format!("Avatar task failed: {e}")))??;

        let key = avatar::avatar_key(Uuid::new_v4());
        self.storage.put(&key, &webp, "image/webp").await?;

        let previous = user.avatar_key.replace(key);
        let user = self.repo.update_user(&user).await?;
        if let Some(previous) = previous {
            self.storage.delete(&previous).await;
        }
        info!(parent: &self.span, user_id = %actor, "avatar updated");
        Ok(user)
    }

    pub async fn delete_avatar(&self, actor: Uuid) -> Result<User, AppError> {
        let mut user = self.get(actor).await?;
        let Some(previous) = user.avatar_key.take() else {
            return Ok(user);
        };
        let user = self.repo.update_user(&user).await?;
        self.storage.delete(&previous).await;
        Ok(user)
    }

    pub async fn search(
        &self,
        query: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let (limit, offset) = page(limit, offset);
        self.repo.search_users(query, limit, offset).await
    }

    pub async fn delete_account(&self, actor: Uuid) -> Result<(), AppError> {
        let user = self.get(actor).await?;
        self.repo.soft_delete_user(actor, Utc::now()).await?;
        self.repo.revoke_user_tokens(actor).await?;
        if let Some(key) = &user.avatar_key {
            self.storage.delete(key).await;
        }
        info!(parent: &self.span, user_id = %actor, "account deleted");
        Ok(())
    }
}
