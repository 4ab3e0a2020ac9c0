//! In-memory cache using DashMap
//!
//! Entries written from store results expire after the configured TTL.
//! Entries that exist nowhere else (bootstrap users, records synthesized while
//! the store was down) are pinned and never expire.

use candor_core::{Feedback, FeedbackId, User, UserId};
use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Map whose entries may carry an expiry deadline
pub struct TtlMap<K, V> {
    data: Arc<DashMap<K, CacheEntry<V>>>,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|expires| now > expires).unwrap_or(false)
    }
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// Get a value; an expired entry is evicted and reported as absent
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.get(key).and_then(|entry| {
            if entry.is_expired(Instant::now()) {
                drop(entry);
                self.data.remove(key);
                return None;
            }
            Some(entry.value.clone())
        })
    }

    /// Set a value that never expires
    pub fn set(&self, key: K, value: V) {
        self.set_until(key, value, None);
    }

    /// Set a value with TTL
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.set_until(key, value, Some(Instant::now() + ttl));
    }

    /// Set a value with an explicit deadline (`None` pins it)
    pub fn set_until(&self, key: K, value: V, expires_at: Option<Instant>) {
        self.data.insert(key, CacheEntry { value, expires_at });
    }

    /// Mutate a live entry in place, keeping its deadline
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V)) -> Option<V> {
        let mut entry = self.data.get_mut(key)?;
        if entry.is_expired(Instant::now()) {
            drop(entry);
            self.data.remove(key);
            return None;
        }
        f(&mut entry.value);
        Some(entry.value.clone())
    }

    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.remove(key);
    }

    /// All live values, in no particular order
    pub fn values(&self) -> Vec<V> {
        let now = Instant::now();
        self.data
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.data.len())
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl<K, V> Default for TtlMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Remembers until when a full listing fetched from the store is trustworthy
#[derive(Default)]
struct ListingMarker {
    valid_until: Mutex<Option<Instant>>,
}

impl ListingMarker {
    fn mark(&self, ttl: Duration) {
        if let Ok(mut guard) = self.valid_until.lock() {
            *guard = Some(Instant::now() + ttl);
        }
    }

    fn is_fresh(&self) -> bool {
        self.valid_until
            .lock()
            .map(|guard| guard.map(|until| Instant::now() <= until).unwrap_or(false))
            .unwrap_or(false)
    }

    fn reset(&self) {
        if let Ok(mut guard) = self.valid_until.lock() {
            *guard = None;
        }
    }
}

/// Entry counts, reported by the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub users: usize,
    pub feedback: usize,
}

/// Process-local cache of users and feedback
///
/// Users are indexed twice (by id and by username); both indexes are always
/// written together with the same deadline so either lookup sees the same
/// record.
pub struct MemoryCache {
    users_by_id: TtlMap<UserId, User>,
    users_by_username: TtlMap<String, User>,
    feedback: TtlMap<FeedbackId, Feedback>,
    users_listed: ListingMarker,
    feedback_listed: ListingMarker,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            users_by_id: TtlMap::new(),
            users_by_username: TtlMap::new(),
            feedback: TtlMap::new(),
            users_listed: ListingMarker::default(),
            feedback_listed: ListingMarker::default(),
            ttl,
        }
    }

    // User entries

    pub fn user(&self, id: UserId) -> Option<User> {
        self.users_by_id.get(&id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<User> {
        self.users_by_username.get(username)
    }

    /// Cache a user fetched from or written to the store
    pub fn put_user(&self, user: &User) {
        self.insert_user(user, Some(Instant::now() + self.ttl));
    }

    /// Cache a user that has no store backing
    pub fn pin_user(&self, user: &User) {
        self.insert_user(user, None);
    }

    fn insert_user(&self, user: &User, expires_at: Option<Instant>) {
        // An id now held by another username drops the old username entry
        if let Some(previous) = self.users_by_id.get(&user.id) {
            if previous.username != user.username {
                self.users_by_username.remove(previous.username.as_str());
            }
        }
        self.users_by_id.set_until(user.id, user.clone(), expires_at);
        self.users_by_username
            .set_until(user.username.clone(), user.clone(), expires_at);
    }

    /// Live users ordered by id
    pub fn users(&self) -> Vec<User> {
        let mut users = self.users_by_id.values();
        users.sort_by_key(|u| u.id);
        users
    }

    pub fn mark_users_listed(&self) {
        self.users_listed.mark(self.ttl);
    }

    pub fn users_listed(&self) -> bool {
        self.users_listed.is_fresh()
    }

    // Feedback entries

    pub fn feedback(&self, id: FeedbackId) -> Option<Feedback> {
        self.feedback.get(&id)
    }

    pub fn put_feedback(&self, feedback: &Feedback) {
        self.feedback
            .set_with_ttl(feedback.id, feedback.clone(), self.ttl);
    }

    pub fn pin_feedback(&self, feedback: &Feedback) {
        self.feedback.set(feedback.id, feedback.clone());
    }

    /// Mutate a cached feedback record in place
    pub fn update_feedback(&self, id: FeedbackId, f: impl FnOnce(&mut Feedback)) -> Option<Feedback> {
        self.feedback.update(&id, f)
    }

    pub fn feedback_values(&self) -> Vec<Feedback> {
        self.feedback.values()
    }

    pub fn mark_feedback_listed(&self) {
        self.feedback_listed.mark(self.ttl);
    }

    pub fn feedback_listed(&self) -> bool {
        self.feedback_listed.is_fresh()
    }

    // Maintenance

    pub fn purge_expired(&self) -> usize {
        self.users_by_id.purge_expired()
            + self.users_by_username.purge_expired()
            + self.feedback.purge_expired()
    }

    pub fn clear(&self) {
        self.users_by_id.clear();
        self.users_by_username.clear();
        self.feedback.clear();
        self.users_listed.reset();
        self.feedback_listed.reset();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            users: self.users_by_id.len(),
            feedback: self.feedback.len(),
        }
    }

    /// Start the periodic sweep of expired entries
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;

                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!("Cache sweep removed {} expired entries", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candor_core::{NewFeedback, NewUser, Role, Sentiment};
    use chrono::Utc;

    fn user(id: UserId, username: &str) -> User {
        User::from_new(
            id,
            NewUser {
                username: username.to_string(),
                role: Role::Employee,
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn feedback(id: FeedbackId) -> Feedback {
        Feedback::from_new(
            id,
            NewFeedback {
                manager_id: 2,
                employee_id: 3,
                strengths: "s".to_string(),
                improvements: "i".to_string(),
                sentiment: Sentiment::Neutral,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_basic_operations() {
        let map: TtlMap<String, Vec<u8>> = TtlMap::new();

        map.set("key1".to_string(), vec![1, 2, 3]);
        assert_eq!(map.get("key1"), Some(vec![1, 2, 3]));
        assert_eq!(map.get("nonexistent"), None);

        map.set("key1".to_string(), vec![4]);
        assert_eq!(map.get("key1"), Some(vec![4]));
        assert_eq!(map.len(), 1);
    }

    #[tokio::test]
    async fn test_ttl() {
        let map: TtlMap<&str, u32> = TtlMap::new();

        map.set_with_ttl("short", 1, Duration::from_millis(10));
        map.set("pinned", 2);
        assert_eq!(map.get(&"short"), Some(1));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(map.get(&"short"), None);
        assert_eq!(map.get(&"pinned"), Some(2));
    }

    #[tokio::test]
    async fn test_purge_and_update_respect_expiry() {
        let map: TtlMap<u32, u32> = TtlMap::new();
        map.set_with_ttl(1, 10, Duration::from_millis(5));
        map.set(2, 20);

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(map.update(&1, |v| *v += 1), None);
        assert_eq!(map.update(&2, |v| *v += 1), Some(21));

        map.set_with_ttl(3, 30, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(map.purge_expired(), 1);
        assert_eq!(map.values(), vec![21]);
    }

    #[test]
    fn test_user_indexes_stay_coherent() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let jane = user(3, "jane");
        cache.put_user(&jane);

        assert_eq!(cache.user(3), Some(jane.clone()));
        assert_eq!(cache.user_by_username("jane"), Some(jane));
        assert_eq!(cache.stats(), CacheStats { users: 1, feedback: 0 });
    }

    #[tokio::test]
    async fn test_pinned_users_outlive_ttl() {
        let cache = MemoryCache::new(Duration::from_millis(10));
        cache.pin_user(&user(1, "admin1"));
        cache.put_user(&user(9, "transient"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.user(9).is_none());
        assert!(cache.user_by_username("transient").is_none());
        assert_eq!(cache.users().len(), 1);
        assert!(cache.user_by_username("admin1").is_some());
    }

    #[tokio::test]
    async fn test_listing_markers_expire() {
        let cache = MemoryCache::new(Duration::from_millis(10));
        assert!(!cache.feedback_listed());

        cache.mark_feedback_listed();
        cache.mark_users_listed();
        assert!(cache.feedback_listed());
        assert!(cache.users_listed());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!cache.feedback_listed());
        assert!(!cache.users_listed());
    }

    #[test]
    fn test_reused_id_evicts_old_username() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.pin_user(&user(3, "ghost"));
        cache.put_user(&user(3, "real"));

        assert!(cache.user_by_username("ghost").is_none());
        assert_eq!(cache.user(3).map(|u| u.username), Some("real".to_string()));
        assert_eq!(cache.user_by_username("real").map(|u| u.id), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_sweeps_expired_entries() {
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(10)));
        cache.put_feedback(&feedback(1));
        cache.pin_feedback(&feedback(2));
        cache.put_user(&user(3, "jane"));

        let sweeper = cache.spawn_cleanup(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;

        // Counts include expired entries until a sweep removes them
        assert_eq!(cache.stats(), CacheStats { users: 0, feedback: 1 });
        assert!(cache.feedback(2).is_some());

        sweeper.abort();
    }

    #[test]
    fn test_update_feedback_in_place() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.pin_feedback(&feedback(4));

        let now = Utc::now();
        let updated = cache.update_feedback(4, |f| {
            f.acknowledge(now);
        });
        assert_eq!(updated.map(|f| f.acknowledged), Some(true));
        assert_eq!(cache.feedback(4).and_then(|f| f.acknowledged_at), Some(now));
        assert!(cache.update_feedback(5, |_| {}).is_none());
    }

    #[test]
    fn test_clear_resets_everything() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.put_user(&user(3, "jane"));
        cache.put_feedback(&feedback(1));
        cache.mark_feedback_listed();

        cache.clear();
        assert_eq!(cache.stats(), CacheStats { users: 0, feedback: 0 });
        assert!(!cache.feedback_listed());
    }
}
