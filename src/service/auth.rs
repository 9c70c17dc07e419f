use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{Span, info, warn};

use crate::auth::{jwt, password};
use crate::config::Config;
use crate::error::AppError;
use crate::models::session::TokenPair;
use crate::models::user::{LoginRequest, NewUser, RegisterRequest, User};
use crate::repository::{SessionRepository, UserRepository};

use super::user::{normalize_email, validate_name, validate_password};

/// Issues and rotates access/refresh token pairs.
pub struct AuthService<R> {
    repo: R,
    jwt_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    span: Span,
}

impl<R> AuthService<R>
where
    R: UserRepository + SessionRepository,
{
    pub fn new(repo: R, config: &Config, span: Span) -> Self {
        Self {
            repo,
            jwt_secret: config.jwt_secret.clone(),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
            span,
        }
    }

    async fn issue(&self, user: &User) -> Result<TokenPair, AppError> {
        let access_token =
            jwt::create_access_token(user.id, &user.email, &self.jwt_secret, self.access_ttl)?;

        let secret = password::generate_refresh_secret();
        let expires_at = Utc::now() + self.refresh_ttl;
        let stored = self
            .repo
            .insert_refresh_token(user.id, &password::hash_password(&secret)?, expires_at)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: password::format_refresh_token(stored.id, &secret),
            expires_at: expires_at.timestamp(),
        })
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<(User, TokenPair), AppError> {
        let email = normalize_email(&req.email)?;
        validate_password(&req.password)?;
        let first_name = validate_name("first_name", &req.first_name)?;
        let last_name = validate_name("last_name", &req.last_name)?;

        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::AlreadyExists(
                "User with this email already exists".into(),
            ));
        }

        let user = self
            .repo
            .create_user(NewUser {
                email,
                password_hash: password::hash_password(&req.password)?,
                first_name,
                last_name,
            })
            .await?;
        info!(parent: &self.span, user_id = %user.id, "user registered");

        let tokens = self.issue(&user).await?;
        Ok((user, tokens))
    }

    pub async fn login(&self, req: LoginRequest) -> Result<(User, TokenPair), AppError> {
        let email = req.email.trim().to_lowercase();
        let user = self
            .repo
            .find_user_by_email(&email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !password::verify_password(&req.password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        info!(parent: &self.span, user_id = %user.id, "user logged in");
        let tokens = self.issue(&user).await?;
        Ok((user, tokens))
    }

    /// Verifies a raw refresh token and returns the owning user.
    async fn redeem(&self, raw: &str) -> Result<User, AppError> {
        let (id, secret) = password::split_refresh_token(raw).ok_or(AppError::Unauthenticated)?;
        let stored = self
            .repo
            .find_refresh_token(id)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !stored.is_usable(Utc::now()) || !password::verify_password(secret, &stored.secret_hash)? {
            return Err(AppError::Unauthenticated);
        }

        self.repo
            .find_user(stored.user_id)
            .await?
            .ok_or(AppError::Unauthenticated)
    }

    /// Rotation: every outstanding refresh token of the user is revoked.
    pub async fn refresh(&self, raw: &str) -> Result<(User, TokenPair), AppError> {
        let user = self.redeem(raw).await?;
        self.repo.revoke_user_tokens(user.id).await?;
        let tokens = self.issue(&user).await?;
        info!(parent: &self.span, user_id = %user.id, "tokens refreshed");
        Ok((user, tokens))
    }

    pub async fn logout(&self, raw: &str) -> Result<(), AppError> {
        let user = self.redeem(raw).await?;
        let revoked = self.repo.revoke_user_tokens(user.id).await?;
        info!(parent: &self.span, user_id = %user.id, revoked, "user logged out");
        Ok(())
    }
}

/// Periodically deletes expired refresh tokens.
pub fn spawn_token_sweeper<R>(repo: R, every: StdDuration, span: Span) -> JoinHandle<()>
where
    R: SessionRepository + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match repo.delete_expired_tokens(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => info!(parent: &span, purged, "expired refresh tokens purged"),
                Err(e) => warn!(parent: &span, "refresh token sweep failed: {e}"),
            }
        }
    })
}
