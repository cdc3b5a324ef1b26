use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::{Error, HtmlError},
    schema::{Id, User},
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub email: String,
    /// Unique token id, stored on logout to revoke the token.
    pub jti: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, email: String, lifetime: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            email,
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            exp,
        }
    }
}

/// An authenticated requester.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub email: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            email: value.email,
            jti: value.jti,
            expires_at: Utc
                .timestamp_opt(value.exp, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|e| {
        log::error!("Unusable token secret: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub fn generate_jwt_session(user: &User, secret: &str, lifetime_hours: i64) -> Result<String, Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.email.to_owned(), Duration::hours(lifetime_hours));

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign token: {e}");
        HtmlError::InternalServerError.default()
    })
}

/// Checks signature and expiry. Revocation is checked separately against the database.
pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.default())?;

    if session.exp <= Utc::now().timestamp() {
        return Err(HtmlError::InvalidSession.new("Token has expired."));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use warp::http::StatusCode;

    use super::*;

    fn user() -> User {
        User {
            id: 42,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Cook"),
            last_name: None,
            password: String::new(),
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let token = generate_jwt_session(&user(), "secret", 1).unwrap();
        let session = verify_jwt_session(&token, "secret").unwrap();

        assert_eq!(session.user_id, 42);
        assert_eq!(session.email, "cook@example.com");
        assert!(!session.jti.is_empty());
    }

    #[test]
    fn every_token_gets_its_own_id() {
        let a = verify_jwt_session(&generate_jwt_session(&user(), "s", 1).unwrap(), "s").unwrap();
        let b = verify_jwt_session(&generate_jwt_session(&user(), "s", 1).unwrap(), "s").unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_session(&user(), "secret", 1).unwrap();
        let error = verify_jwt_session(&token, "other").unwrap_err();
        assert_eq!(error.code, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_jwt_session(&user(), "secret", -1).unwrap();
        let error = verify_jwt_session(&token, "secret").unwrap_err();
        assert_eq!(error.info.as_deref(), Some("Token has expired."));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_jwt_session("not.a.token", "secret").is_err());
    }

    #[test]
    fn session_carries_expiry() {
        let claims = JwtSessionData::new(1, String::from("a@b.c"), Duration::hours(2));
        let session: SessionData = claims.clone().into();
        assert_eq!(session.expires_at.timestamp(), claims.exp);
    }
}
