//! Authentication handlers

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use candor_core::{CandorError, User};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    user: User,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = payload?;
    info!("Login attempt for: {}", req.username);

    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::from(CandorError::validation(
            "Username and password are required",
        )));
    }

    let (token, user) = state
        .auth_service
        .login(req.username.trim(), &req.password)
        .await?;

    Ok(Json(LoginResponse { token, user }))
}

pub async fn current_user(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}
