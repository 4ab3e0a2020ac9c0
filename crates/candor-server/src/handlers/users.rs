//! User handlers

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::services::auth::hash_password;
use crate::AppState;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use candor_core::{CandorError, Lookup, NewUser, Role, RoleUpdate, User, UserId};
use serde::Deserialize;
use std::str::FromStr;
use tracing::info;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    username: String,
    password: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    #[serde(default)]
    role: Role,
    manager_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    role: String,
    manager_id: Option<UserId>,
}

pub async fn list(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    auth.require_admin()?;
    Ok(Json(state.users.all_users().await))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    auth.require_admin()?;
    let Json(req) = payload?;

    let mut errors = Vec::new();
    let username = req.username.trim().to_string();
    if username.is_empty() {
        errors.push("username is required".to_string());
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if !errors.is_empty() {
        return Err(CandorError::invalid_fields("Invalid data", errors).into());
    }

    let update = RoleUpdate {
        role: req.role,
        manager_id: req.manager_id,
    }
    .normalized();
    if let Some(manager_id) = update.manager_id {
        ensure_manager(&state, manager_id).await?;
    }

    let user = state
        .users
        .create_user(NewUser {
            username,
            password_hash: hash_password(&req.password)?,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            role: update.role,
            manager_id: update.manager_id,
        })
        .await?;

    info!("Admin {} created user {}", auth.0.username, user.username);
    Ok((StatusCode::CREATED, Json(user)))
}

/// Admin change of any user's role and reporting line
pub async fn update_role(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<UserId>, PathRejection>,
    payload: Result<Json<RoleRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    auth.require_admin()?;
    let Path(id) = path?;
    let Json(req) = payload?;

    let role = Role::from_str(&req.role)
        .map_err(|_| ApiError::from(CandorError::validation("Invalid role")))?;
    let update = RoleUpdate {
        role,
        manager_id: req.manager_id,
    }
    .normalized();
    if let Some(manager_id) = update.manager_id {
        if manager_id == id {
            return Err(CandorError::validation("A user cannot manage themselves").into());
        }
        ensure_manager(&state, manager_id).await?;
    }

    let user = state.users.update_user_role(id, update).await?;
    info!("User {} is now {}", user.username, user.role);
    Ok(Json(user))
}

/// Self-service switch between manager and employee
pub async fn update_own_role(
    AuthUser(me): AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<RoleRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(req) = payload?;

    let role = match Role::from_str(&req.role) {
        Ok(role @ (Role::Manager | Role::Employee)) => role,
        _ => return Err(CandorError::validation("Invalid role").into()),
    };
    let update = RoleUpdate {
        role,
        manager_id: req.manager_id,
    }
    .normalized();
    if let Some(manager_id) = update.manager_id {
        if manager_id == me.id {
            return Err(CandorError::validation("A user cannot manage themselves").into());
        }
        ensure_manager(&state, manager_id).await?;
    }

    Ok(Json(state.users.update_user_role(me.id, update).await?))
}

/// A `managerId` must name an existing manager.
pub(crate) async fn ensure_manager(state: &AppState, manager_id: UserId) -> ApiResult<()> {
    match state.users.get_user(manager_id).await {
        Lookup::Found(user) if user.is_manager() => Ok(()),
        Lookup::Found(_) | Lookup::NotFound => {
            Err(CandorError::validation("managerId must reference a manager").into())
        }
        Lookup::StoreUnavailable => Err(CandorError::StoreUnavailable(format!(
            "cannot resolve manager {}",
            manager_id
        ))
        .into()),
    }
}
