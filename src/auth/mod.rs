use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::SecurityConfig;

/// Staff role. Stored as lowercase text in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),
}

/// Signing and verification keys derived from the configured secret.
///
/// Built once at startup and shared through the application state.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiry: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, JwtError> {
        if secret.trim().is_empty() {
            return Err(JwtError::InvalidSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry: Duration::hours(expiry_hours as i64),
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, JwtError> {
        Self::new(&security.jwt_secret, security.jwt_expiry_hours)
    }

    pub fn expires_in_secs(&self) -> i64 {
        self.expiry.num_seconds()
    }

    /// Issue a claim for the given identity, valid for the configured window.
    pub fn issue(&self, id: i32, username: &str, role: Role) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            id,
            username: username.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    /// Check signature and expiry. Both must hold for the claim to be trusted.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Hash a password on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, PasswordError> {
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hashed)
}

/// Verify a password against a stored bcrypt hash on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> Result<bool, PasswordError> {
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new("unit-test-secret", 8).unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let keys = keys();
        let token = keys.issue(7, "maria", Role::User).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.id, 7);
        assert_eq!(claims.username, "maria");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.exp - claims.iat, 8 * 3600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys();
        let now = Utc::now().timestamp();
        let token = keys
            .sign(&Claims {
                id: 1,
                username: "admin".into(),
                role: Role::Admin,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = JwtKeys::new("another-secret", 8).unwrap();
        let token = other.issue(1, "admin", Role::Admin).unwrap();
        assert!(keys().verify(&token).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(JwtKeys::new("", 8), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password("admin123".into(), 4).await.unwrap();
        assert!(verify_password("admin123".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hash).await.unwrap());
    }
}
