//! Feedback handlers

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::AppState;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use candor_core::{
    CandorError, Feedback, FeedbackId, FeedbackPatch, FeedbackWithUsers, Lookup, NewFeedback,
    Role, Sentiment, UserId,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    employee_id: UserId,
    strengths: String,
    improvements: String,
    sentiment: Sentiment,
}

pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateFeedbackRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Feedback>)> {
    let manager = auth.require_manager("create feedback")?;
    let Json(req) = payload?;

    let mut errors = Vec::new();
    if req.strengths.trim().is_empty() {
        errors.push("strengths is required".to_string());
    }
    if req.improvements.trim().is_empty() {
        errors.push("improvements is required".to_string());
    }
    if !errors.is_empty() {
        return Err(CandorError::invalid_fields("Invalid data", errors).into());
    }

    match state.users.get_user(req.employee_id).await {
        Lookup::Found(employee) if manager.manages(&employee) => {}
        Lookup::Found(_) | Lookup::NotFound => {
            return Err(CandorError::Forbidden(
                "You can only give feedback to your direct reports".to_string(),
            )
            .into())
        }
        Lookup::StoreUnavailable => {
            return Err(CandorError::StoreUnavailable(format!(
                "cannot resolve employee {}",
                req.employee_id
            ))
            .into())
        }
    }

    let feedback = state
        .feedback
        .create_feedback(NewFeedback {
            manager_id: manager.id,
            employee_id: req.employee_id,
            strengths: req.strengths,
            improvements: req.improvements,
            sentiment: req.sentiment,
        })
        .await?;

    info!(
        "Manager {} wrote feedback {} for employee {}",
        manager.id, feedback.id, feedback.employee_id
    );
    Ok((StatusCode::CREATED, Json(feedback)))
}

/// Edit by the authoring manager. Feedback written by someone else is
/// reported as missing.
pub async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<FeedbackId>, PathRejection>,
    payload: Result<Json<FeedbackPatch>, JsonRejection>,
) -> ApiResult<Json<Feedback>> {
    let manager = auth.require_manager("edit feedback")?;
    let Path(id) = path?;
    let Json(patch) = payload?;

    let blank = [
        ("strengths", &patch.strengths),
        ("improvements", &patch.improvements),
    ]
    .into_iter()
    .filter(|(_, value)| value.as_deref().is_some_and(|v| v.trim().is_empty()))
    .map(|(field, _)| format!("{} must not be empty", field))
    .collect::<Vec<_>>();
    if !blank.is_empty() {
        return Err(CandorError::invalid_fields("Invalid data", blank).into());
    }

    let existing = state
        .feedback
        .get_feedback(id)
        .await
        .require(|| format!("feedback {}", id))?;
    if existing.manager_id != manager.id {
        return Err(CandorError::NotFound(format!("feedback {}", id)).into());
    }

    Ok(Json(state.feedback.update_feedback(id, patch).await?))
}

pub async fn acknowledge(
    AuthUser(me): AuthUser,
    State(state): State<AppState>,
    path: Result<Path<FeedbackId>, PathRejection>,
) -> ApiResult<Json<Feedback>> {
    let Path(id) = path?;

    let existing = state
        .feedback
        .get_feedback(id)
        .await
        .require(|| format!("feedback {}", id))?;
    if existing.employee_id != me.id {
        return Err(CandorError::Forbidden(
            "You can only acknowledge your own feedback".to_string(),
        )
        .into());
    }

    let feedback = state.feedback.acknowledge_feedback(id).await?;
    info!("Employee {} acknowledged feedback {}", me.id, id);
    Ok(Json(feedback))
}

/// Feedback the calling manager has written
pub async fn for_manager(
    auth: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<FeedbackWithUsers>>> {
    let manager = auth.require_manager("access this endpoint")?;
    Ok(Json(
        state.feedback.feedback_with_users(Some(manager.id), None).await,
    ))
}

/// Feedback the caller has received
pub async fn for_self(
    AuthUser(me): AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<FeedbackWithUsers>> {
    Json(state.feedback.feedback_with_users(None, Some(me.id)).await)
}

/// Feedback received by one employee. Employees may only ask about
/// themselves and managers about their direct reports.
pub async fn for_employee(
    AuthUser(me): AuthUser,
    State(state): State<AppState>,
    path: Result<Path<UserId>, PathRejection>,
) -> ApiResult<Json<Vec<FeedbackWithUsers>>> {
    let Path(employee_id) = path?;

    match me.role {
        Role::Admin => {}
        Role::Employee if me.id == employee_id => {}
        Role::Employee => return Err(access_denied()),
        Role::Manager => {
            let employee = match state.users.get_user(employee_id).await {
                Lookup::Found(employee) => employee,
                Lookup::NotFound => return Err(access_denied()),
                Lookup::StoreUnavailable => {
                    return Err(CandorError::StoreUnavailable(format!(
                        "cannot resolve employee {}",
                        employee_id
                    ))
                    .into())
                }
            };
            if !me.manages(&employee) {
                return Err(access_denied());
            }
        }
    }

    Ok(Json(
        state
            .feedback
            .feedback_with_users(None, Some(employee_id))
            .await,
    ))
}

pub async fn list_all(
    auth: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<FeedbackWithUsers>>> {
    auth.require_admin()?;
    Ok(Json(state.feedback.feedback_with_users(None, None).await))
}

fn access_denied() -> ApiError {
    CandorError::Forbidden("Access denied".to_string()).into()
}
