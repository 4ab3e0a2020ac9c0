//! Auth extractor for protected routes

use crate::error::ApiError;
use crate::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use candor_core::{CandorError, Lookup, User};
use tracing::debug;

/// The caller, resolved from the bearer token
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid Authorization format"))?;

        let user_id = state.auth_service.validate_token(token)?;

        match state.users.get_user(user_id).await {
            Lookup::Found(user) => Ok(AuthUser(user)),
            Lookup::NotFound => {
                debug!("Token for unknown user {}", user_id);
                Err(unauthorized("User not found"))
            }
            Lookup::StoreUnavailable => Err(CandorError::StoreUnavailable(format!(
                "cannot resolve user {}",
                user_id
            ))
            .into()),
        }
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<&User, ApiError> {
        if self.0.is_admin() {
            Ok(&self.0)
        } else {
            Err(CandorError::Forbidden("Admin access required".to_string()).into())
        }
    }

    pub fn require_manager(&self, what: &str) -> Result<&User, ApiError> {
        if self.0.is_manager() {
            Ok(&self.0)
        } else {
            Err(CandorError::Forbidden(format!("Only managers can {}", what)).into())
        }
    }
}

fn unauthorized(message: &str) -> ApiError {
    CandorError::Unauthorized(message.to_string()).into()
}
