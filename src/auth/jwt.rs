use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    secret: &str,
    lifetime: Duration,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (now + lifetime).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token creation failed: {e}")))
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates_with_same_secret() {
        let id = Uuid::new_v4();
        let token = create_access_token(id, "a@example.com", "s3cret", Duration::minutes(5)).unwrap();
        let claims = validate_access_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let id = Uuid::new_v4();
        let token = create_access_token(id, "a@example.com", "s3cret", Duration::minutes(5)).unwrap();
        assert!(matches!(
            validate_access_token(&token, "other"),
            Err(AppError::Unauthenticated)
        ));

        let expired =
            create_access_token(id, "a@example.com", "s3cret", Duration::minutes(-10)).unwrap();
        assert!(matches!(
            validate_access_token(&expired, "s3cret"),
            Err(AppError::Unauthenticated)
        ));
    }
}
