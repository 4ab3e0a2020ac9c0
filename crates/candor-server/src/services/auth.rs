//! Authentication service

use crate::services::UserDirectory;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use candor_core::{CandorError, Lookup, Result, User, UserId};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub struct AuthService {
    users: Arc<UserDirectory>,
    jwt_secret: String,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(users: Arc<UserDirectory>, jwt_secret: String, token_ttl: Duration) -> Self {
        Self {
            users,
            jwt_secret,
            token_ttl,
        }
    }

    /// Check a username and password, returning a signed access token.
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the
    /// caller. A store outage is reported as such.
    pub async fn login(&self, username: &str, password: &str) -> Result<(String, User)> {
        let user = match self.users.get_user_by_username(username).await {
            Lookup::Found(user) => user,
            Lookup::NotFound => {
                debug!("Login for unknown user {}", username);
                return Err(invalid_credentials());
            }
            Lookup::StoreUnavailable => {
                return Err(CandorError::StoreUnavailable(
                    "cannot look up user".to_string(),
                ))
            }
        };

        if !verify_password(password, &user.password_hash) {
            debug!("Wrong password for {}", username);
            return Err(invalid_credentials());
        }

        let token = self.issue_token(user.id)?;
        info!("User {} logged in", user.username);
        Ok((token, user))
    }

    pub fn issue_token(&self, user_id: UserId) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| CandorError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<UserId> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| CandorError::Unauthorized(format!("Invalid token: {}", e)))?;

        if token_data.claims.token_type != "access" {
            return Err(CandorError::Unauthorized("Invalid token type".to_string()));
        }

        token_data
            .claims
            .sub
            .parse()
            .map_err(|_| CandorError::Unauthorized("Invalid token subject".to_string()))
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CandorError::Internal(format!("Failed to hash password: {}", e)))
}

/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn invalid_credentials() -> CandorError {
    CandorError::Unauthorized("Invalid credentials".to_string())
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id
    exp: i64,
    iat: i64,
    token_type: String,
}
