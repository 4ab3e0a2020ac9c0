//! Team handlers

use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::AppState;
use axum::{extract::State, Json};
use candor_core::User;

/// Direct reports of the calling manager
pub async fn members(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let manager = auth.require_manager("view team members")?;
    Ok(Json(state.users.team_members(manager.id).await))
}
