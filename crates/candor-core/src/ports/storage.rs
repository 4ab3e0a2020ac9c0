//! Storage traits for persistence
//!
//! Implementations report an unreachable backend as
//! [`CandorError::StoreUnavailable`](crate::CandorError::StoreUnavailable) and a
//! uniqueness violation as [`CandorError::Conflict`](crate::CandorError::Conflict).

use crate::Result;
use async_trait::async_trait;
use candor_types::{
    Feedback, FeedbackId, FeedbackPatch, NewFeedback, NewUser, RoleUpdate, User, UserId,
};
use chrono::{DateTime, Utc};

/// User store
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    /// Returns `None` when no user has `id`.
    async fn update_user_role(&self, id: UserId, update: RoleUpdate) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn list_team_members(&self, manager_id: UserId) -> Result<Vec<User>>;
    /// Insert a user with a fixed id unless that id or username is taken.
    /// Returns whether a row was written.
    async fn seed_user(&self, user: &User) -> Result<bool>;
}

/// Feedback store
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn create_feedback(&self, feedback: &NewFeedback) -> Result<Feedback>;
    async fn get_feedback(&self, id: FeedbackId) -> Result<Option<Feedback>>;
    /// All feedback, newest first.
    async fn list_feedback(&self) -> Result<Vec<Feedback>>;
    async fn update_feedback(
        &self,
        id: FeedbackId,
        patch: &FeedbackPatch,
    ) -> Result<Option<Feedback>>;
    /// Sets `acknowledged`, and `acknowledged_at` only if it was unset.
    async fn acknowledge_feedback(
        &self,
        id: FeedbackId,
        at: DateTime<Utc>,
    ) -> Result<Option<Feedback>>;
}

/// Complete backing store
#[async_trait]
pub trait Store: UserStore + FeedbackStore {
    /// Cheap round trip used by health checks.
    async fn ping(&self) -> Result<()>;
}
