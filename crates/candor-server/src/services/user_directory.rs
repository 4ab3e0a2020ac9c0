//! User directory service
//!
//! Reads go cache first, then the store. Store failures on reads surface as
//! [`Lookup::StoreUnavailable`] instead of an error. User creation falls back
//! to a cache-only record when the store is down; role updates do not.

use crate::storage::MemoryCache;
use candor_core::ports::Store;
use candor_core::{CandorError, Lookup, NewUser, Result, Role, RoleUpdate, User, UserId};
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct UserDirectory {
    store: Arc<dyn Store>,
    cache: Arc<MemoryCache>,
    next_synthetic_id: AtomicI64,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>, cache: Arc<MemoryCache>) -> Self {
        let next = first_synthetic_id(cache.users().iter().map(|u| u.id));
        Self {
            store,
            cache,
            next_synthetic_id: AtomicI64::new(next),
        }
    }

    /// Pin the demo accounts in the cache and copy them into the store when it
    /// is reachable. Returns how many were newly written to the store.
    pub async fn seed_bootstrap(&self, password_hash: &str) -> usize {
        let users = bootstrap_users(password_hash);
        for user in &users {
            self.cache.pin_user(user);
        }

        let mut written = 0;
        for user in &users {
            match self.store.seed_user(user).await {
                Ok(true) => written += 1,
                Ok(false) => debug!("Bootstrap user {} already stored", user.username),
                Err(e) => {
                    warn!("Bootstrap users kept in cache only, store write failed: {}", e);
                    break;
                }
            }
        }

        info!(
            "Seeded {} bootstrap users ({} new in store)",
            users.len(),
            written
        );
        written
    }

    pub async fn get_user(&self, id: UserId) -> Lookup<User> {
        if let Some(user) = self.cache.user(id) {
            debug!("Using cached user data for id {}", id);
            return Lookup::Found(user);
        }

        match self.store.get_user(id).await {
            Ok(Some(user)) => {
                self.remember(&user);
                Lookup::Found(user)
            }
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                warn!("Store query failed for user {}: {}", id, e);
                Lookup::StoreUnavailable
            }
        }
    }

    pub async fn get_user_by_username(&self, username: &str) -> Lookup<User> {
        if let Some(user) = self.cache.user_by_username(username) {
            debug!("Using cached user data for: {}", username);
            return Lookup::Found(user);
        }

        match self.store.get_user_by_username(username).await {
            Ok(Some(user)) => {
                self.remember(&user);
                Lookup::Found(user)
            }
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                warn!("Store query failed for username {}: {}", username, e);
                Lookup::StoreUnavailable
            }
        }
    }

    pub async fn create_user(&self, new: NewUser) -> Result<User> {
        match self.store.create_user(&new).await {
            Ok(user) => {
                info!("Created user {} ({}) as {}", user.id, user.username, user.role);
                self.remember(&user);
                Ok(user)
            }
            Err(e) if e.is_store_failure() => {
                warn!("Store insert failed for user {}: {}", new.username, e);

                if self.cache.user_by_username(&new.username).is_some() {
                    return Err(CandorError::Conflict(format!(
                        "username {} is already taken",
                        new.username
                    )));
                }

                let id = self.next_synthetic_id.fetch_sub(1, Ordering::SeqCst);
                let user = User::from_new(id, new, Utc::now());
                self.cache.pin_user(&user);
                warn!(
                    "User {} ({}) exists in cache only and will not reach the store",
                    user.id, user.username
                );
                Ok(user)
            }
            Err(e) => Err(e),
        }
    }

    /// Change a user's role and reporting line. Goes straight to the store;
    /// there is no cache fallback for this write.
    pub async fn update_user_role(&self, id: UserId, update: RoleUpdate) -> Result<User> {
        let update = update.normalized();
        match self.store.update_user_role(id, update).await? {
            Some(user) => {
                info!(
                    "User {} is now {} (manager: {:?})",
                    user.id, user.role, user.manager_id
                );
                self.remember(&user);
                Ok(user)
            }
            None => Err(CandorError::NotFound(format!("user {}", id))),
        }
    }

    /// Every known user, ordered by id
    pub async fn all_users(&self) -> Vec<User> {
        if self.cache.users_listed() {
            return self.cache.users();
        }

        match self.store.list_users().await {
            Ok(users) => {
                self.cache.mark_users_listed();
                for user in &users {
                    self.remember(user);
                }
            }
            Err(e) => warn!("Store listing of users failed, serving cache: {}", e),
        }
        self.cache.users()
    }

    /// Users whose manager is `manager_id`. The cache answers alone only
    /// while it holds a complete user listing; otherwise the store is asked
    /// and the cache is the fallback.
    pub async fn team_members(&self, manager_id: UserId) -> Vec<User> {
        let reports_to = |u: &User| u.manager_id == Some(manager_id);

        if self.cache.users_listed() {
            return self.cache.users().into_iter().filter(reports_to).collect();
        }

        match self.store.list_team_members(manager_id).await {
            Ok(mut members) => {
                for user in &members {
                    self.remember(user);
                }
                // Members created during an outage exist only in the cache
                members.extend(
                    self.cache
                        .users()
                        .into_iter()
                        .filter(|u| is_synthetic(u.id) && reports_to(u)),
                );
                members
            }
            Err(e) => {
                warn!("Store query failed for team of {}, serving cache: {}", manager_id, e);
                self.cache.users().into_iter().filter(reports_to).collect()
            }
        }
    }

    fn remember(&self, user: &User) {
        self.cache.put_user(user);
    }
}

/// Cache-only records count down from -1 so they never share an id with a
/// row the store hands out.
pub(crate) fn first_synthetic_id(cached: impl Iterator<Item = i64>) -> i64 {
    cached.min().map_or(-1, |lowest| lowest.min(0) - 1)
}

pub(crate) fn is_synthetic(id: i64) -> bool {
    id < 0
}

/// Demo accounts: one admin, two managers, three employees
fn bootstrap_users(password_hash: &str) -> Vec<User> {
    let now = Utc::now();
    let user = |id: UserId,
                username: &str,
                first: &str,
                last: &str,
                role: Role,
                manager_id: Option<UserId>| User {
        id,
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        email: Some(format!("{}@company.com", username)),
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        role,
        manager_id,
        created_at: now,
        updated_at: now,
    };

    vec![
        user(1, "admin", "System", "Admin", Role::Admin, None),
        user(2, "manager1", "John", "Manager", Role::Manager, None),
        user(3, "manager2", "Sarah", "Thompson", Role::Manager, None),
        user(4, "employee1", "Alice", "Johnson", Role::Employee, Some(2)),
        user(5, "employee2", "Bob", "Smith", Role::Employee, Some(2)),
        user(6, "employee3", "Carol", "Davis", Role::Employee, Some(3)),
    ]
}
