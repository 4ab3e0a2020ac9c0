//! Feedback management service

use crate::services::user_directory::{first_synthetic_id, is_synthetic};
use crate::services::UserDirectory;
use crate::storage::MemoryCache;
use candor_core::ports::Store;
use candor_core::{
    CandorError, Feedback, FeedbackId, FeedbackPatch, FeedbackWithUsers, Lookup, NewFeedback,
    Result, UserId,
};
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct FeedbackManager {
    store: Arc<dyn Store>,
    cache: Arc<MemoryCache>,
    users: Arc<UserDirectory>,
    next_synthetic_id: AtomicI64,
}

impl FeedbackManager {
    pub fn new(store: Arc<dyn Store>, cache: Arc<MemoryCache>, users: Arc<UserDirectory>) -> Self {
        let next = first_synthetic_id(cache.feedback_values().iter().map(|f| f.id));
        Self {
            store,
            cache,
            users,
            next_synthetic_id: AtomicI64::new(next),
        }
    }

    pub async fn create_feedback(&self, new: NewFeedback) -> Result<Feedback> {
        info!(
            "Creating feedback: manager={}, employee={}, sentiment={}",
            new.manager_id, new.employee_id, new.sentiment
        );

        match self.store.create_feedback(&new).await {
            Ok(feedback) => Ok(self.remember(feedback)),
            Err(e) if e.is_store_failure() => {
                warn!("Store insert failed for feedback: {}", e);
                let id = self.next_synthetic_id.fetch_sub(1, Ordering::SeqCst);
                let feedback = Feedback::from_new(id, new, Utc::now());
                self.cache.pin_feedback(&feedback);
                warn!("Feedback {} exists in cache only", feedback.id);
                Ok(feedback)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_feedback(&self, id: FeedbackId) -> Lookup<Feedback> {
        if let Some(feedback) = self.cache.feedback(id) {
            return Lookup::Found(feedback);
        }
        if self.cache.feedback_listed() {
            // The cache holds the complete listing, so the store has nothing more
            return Lookup::NotFound;
        }

        match self.store.get_feedback(id).await {
            Ok(Some(feedback)) => Lookup::Found(self.remember(feedback)),
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                warn!("Store query failed for feedback {}: {}", id, e);
                Lookup::StoreUnavailable
            }
        }
    }

    /// Edit strengths, improvements or sentiment. Acknowledgment is untouched.
    pub async fn update_feedback(&self, id: FeedbackId, patch: FeedbackPatch) -> Result<Feedback> {
        let now = Utc::now();
        if is_synthetic(id) {
            return self
                .cache
                .update_feedback(id, |f| f.apply(&patch, now))
                .ok_or_else(|| CandorError::NotFound(format!("feedback {}", id)));
        }
        match self.store.update_feedback(id, &patch).await {
            Ok(Some(feedback)) => Ok(self.remember(feedback)),
            Ok(None) => self
                .cache
                .update_feedback(id, |f| f.apply(&patch, now))
                .ok_or_else(|| CandorError::NotFound(format!("feedback {}", id))),
            Err(e) if e.is_store_failure() => {
                warn!("Store update failed for feedback {}: {}", id, e);
                self.cache
                    .update_feedback(id, |f| f.apply(&patch, now))
                    .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    /// One-way transition to acknowledged. Acknowledging twice is not an error
    /// and keeps the first acknowledgment time.
    pub async fn acknowledge_feedback(&self, id: FeedbackId) -> Result<Feedback> {
        let now = Utc::now();

        if let Some(cached) = self.cache.update_feedback(id, |f| {
            f.acknowledge(now);
        }) {
            if is_synthetic(id) {
                debug!("Feedback {} exists in cache only", id);
                return Ok(cached);
            }
            let at = cached.acknowledged_at.unwrap_or(now);
            return match self.store.acknowledge_feedback(id, at).await {
                Ok(Some(stored)) => Ok(self.remember(stored)),
                Ok(None) => {
                    debug!("Feedback {} exists in cache only", id);
                    Ok(cached)
                }
                Err(e) => {
                    warn!(
                        "Acknowledgment of feedback {} kept in cache only: {}",
                        id, e
                    );
                    Ok(cached)
                }
            };
        }

        match self.store.acknowledge_feedback(id, now).await? {
            Some(stored) => Ok(self.remember(stored)),
            None => Err(CandorError::NotFound(format!("feedback {}", id))),
        }
    }

    /// All feedback, newest first
    pub async fn all_feedback(&self) -> Vec<Feedback> {
        if !self.cache.feedback_listed() {
            match self.store.list_feedback().await {
                Ok(list) => {
                    self.cache.mark_feedback_listed();
                    for feedback in list {
                        self.remember(feedback);
                    }
                }
                Err(e) => warn!("Store listing of feedback failed, serving cache: {}", e),
            }
        }

        newest_first(self.cache.feedback_values())
    }

    pub async fn feedback_by_manager(&self, manager_id: UserId) -> Vec<Feedback> {
        self.all_feedback()
            .await
            .into_iter()
            .filter(|f| f.manager_id == manager_id)
            .collect()
    }

    pub async fn feedback_by_employee(&self, employee_id: UserId) -> Vec<Feedback> {
        self.all_feedback()
            .await
            .into_iter()
            .filter(|f| f.employee_id == employee_id)
            .collect()
    }

    /// Feedback matching both optional filters, joined with its manager and
    /// employee. Records whose users cannot be resolved are left out.
    pub async fn feedback_with_users(
        &self,
        manager_id: Option<UserId>,
        employee_id: Option<UserId>,
    ) -> Vec<FeedbackWithUsers> {
        let mut enriched = Vec::new();

        for feedback in self.all_feedback().await {
            if manager_id.is_some_and(|id| feedback.manager_id != id) {
                continue;
            }
            if employee_id.is_some_and(|id| feedback.employee_id != id) {
                continue;
            }

            let manager = self.users.get_user(feedback.manager_id).await.found();
            let employee = self.users.get_user(feedback.employee_id).await.found();
            match (manager, employee) {
                (Some(manager), Some(employee)) => enriched.push(FeedbackWithUsers {
                    feedback,
                    manager,
                    employee,
                }),
                _ => debug!("Skipping feedback {}: users not resolvable", feedback.id),
            }
        }

        enriched
    }

    /// Cache a record that came from the store. An acknowledgment of the same
    /// record that so far only reached the cache is carried over rather than
    /// lost.
    fn remember(&self, mut stored: Feedback) -> Feedback {
        if let Some(cached) = self.cache.feedback(stored.id) {
            let same_record = !is_synthetic(cached.id)
                && cached.manager_id == stored.manager_id
                && cached.employee_id == stored.employee_id
                && cached.created_at == stored.created_at;
            if same_record && cached.acknowledged && !stored.acknowledged {
                stored.acknowledged = true;
                stored.acknowledged_at = cached.acknowledged_at;
            }
        }
        self.cache.put_feedback(&stored);
        stored
    }
}

fn newest_first(mut feedback: Vec<Feedback>) -> Vec<Feedback> {
    feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    feedback
}
