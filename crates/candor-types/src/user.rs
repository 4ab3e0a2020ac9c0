//! User types

use crate::{UnknownVariant, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

/// User account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub manager_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a user from a creation payload, stamping both timestamps with `now`.
    pub fn from_new(id: UserId, new: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id,
            username: new.username,
            password_hash: new.password_hash,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            role: new.role,
            manager_id: new.manager_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    /// True when `employee` reports directly to this user.
    pub fn manages(&self, employee: &User) -> bool {
        self.is_manager() && employee.manager_id == Some(self.id)
    }
}

/// Data needed to create a user; the password is already hashed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub manager_id: Option<UserId>,
}

/// Role and reporting line change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    pub role: Role,
    pub manager_id: Option<UserId>,
}

impl RoleUpdate {
    /// Only employees report to a manager; any other role drops the reference.
    pub fn normalized(self) -> Self {
        match self.role {
            Role::Employee => self,
            _ => Self {
                role: self.role,
                manager_id: None,
            },
        }
    }
}
