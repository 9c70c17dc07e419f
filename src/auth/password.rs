use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use uuid::Uuid;

use crate::error::AppError;

const REFRESH_SECRET_LEN: usize = 48;

/// Argon2 hash used for both passwords and refresh-token secrets.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn generate_refresh_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Refresh tokens travel as `<token id>.<secret>`.
pub fn format_refresh_token(id: Uuid, secret: &str) -> String {
    format!("{id}.{secret}")
}

pub fn split_refresh_token(raw: &str) -> Option<(Uuid, &str)> {
    let (id, secret) = raw.split_once('.')?;
    if secret.is_empty() {
        return None;
    }
    Some((Uuid::parse_str(id).ok()?, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn refresh_token_splits_back_into_parts() {
        let id = Uuid::new_v4();
        let secret = generate_refresh_secret();
        assert_eq!(secret.len(), REFRESH_SECRET_LEN);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));

        let raw = format_refresh_token(id, &secret);
        assert_eq!(split_refresh_token(&raw), Some((id, secret.as_str())));
    }

    #[test]
    fn malformed_refresh_tokens_are_rejected() {
        assert_eq!(split_refresh_token("no-dot-here"), None);
        assert_eq!(split_refresh_token("not-a-uuid.secret"), None);
        assert_eq!(split_refresh_token(&format!("{}.", Uuid::new_v4())), None);
    }
}
