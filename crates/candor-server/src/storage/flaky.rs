//! Store wrapper that can be switched offline, for exercising cache fallbacks

use async_trait::async_trait;
use candor_core::ports::{FeedbackStore, Store, UserStore};
use candor_core::{
    CandorError, Feedback, FeedbackId, FeedbackPatch, NewFeedback, NewUser, Result, RoleUpdate,
    User, UserId,
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub struct FlakyStore {
    inner: Arc<dyn Store>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of store calls attempted, online or not
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(CandorError::StoreUnavailable(
                "connection refused (simulated)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        self.check()?;
        self.inner.create_user(user).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.check()?;
        self.inner.get_user(id).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.check()?;
        self.inner.get_user_by_username(username).await
    }

    async fn update_user_role(&self, id: UserId, update: RoleUpdate) -> Result<Option<User>> {
        self.check()?;
        self.inner.update_user_role(id, update).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.check()?;
        self.inner.list_users().await
    }

    async fn list_team_members(&self, manager_id: UserId) -> Result<Vec<User>> {
        self.check()?;
        self.inner.list_team_members(manager_id).await
    }

    async fn seed_user(&self, user: &User) -> Result<bool> {
        self.check()?;
        self.inner.seed_user(user).await
    }
}

#[async_trait]
impl FeedbackStore for FlakyStore {
    async fn create_feedback(&self, feedback: &NewFeedback) -> Result<Feedback> {
        self.check()?;
        self.inner.create_feedback(feedback).await
    }

    async fn get_feedback(&self, id: FeedbackId) -> Result<Option<Feedback>> {
        self.check()?;
        self.inner.get_feedback(id).await
    }

    async fn list_feedback(&self) -> Result<Vec<Feedback>> {
        self.check()?;
        self.inner.list_feedback().await
    }

    async fn update_feedback(
        &self,
        id: FeedbackId,
        patch: &FeedbackPatch,
    ) -> Result<Option<Feedback>> {
        self.check()?;
        self.inner.update_feedback(id, patch).await
    }

    async fn acknowledge_feedback(
        &self,
        id: FeedbackId,
        at: DateTime<Utc>,
    ) -> Result<Option<Feedback>> {
        self.check()?;
        self.inner.acknowledge_feedback(id, at).await
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn ping(&self) -> Result<()> {
        self.check()?;
        self.inner.ping().await
    }
}
