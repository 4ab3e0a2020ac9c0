//! SQLite database layer (embedded, no external dependencies)

use anyhow::{Context, Result};
use async_trait::async_trait;
use candor_core::ports::{FeedbackStore, Store, UserStore};
use candor_core::{
    CandorError, Feedback, FeedbackId, FeedbackPatch, NewFeedback, NewUser, Role, RoleUpdate,
    Sentiment, User, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const USER_COLUMNS: &str = "id, username, password_hash, email, first_name, last_name, role, \
                            manager_id, created_at, updated_at";

const FEEDBACK_COLUMNS: &str = "id, manager_id, employee_id, strengths, improvements, sentiment, \
                                acknowledged, acknowledged_at, created_at, updated_at";

/// Connection pool settings
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    pub async fn new(database_path: &str, settings: PoolSettings) -> Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        // Create parent directory if needed
        let parent = std::path::Path::new(database_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;

        let test_file = parent.join(".write_test");
        match tokio::fs::write(&test_file, b"test").await {
            Ok(_) => {
                let _ = tokio::fs::remove_file(&test_file).await;
                tracing::debug!("Database directory is writable");
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Database directory is not writable: {}: {}",
                    parent.display(),
                    e
                ));
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to SQLite database at: {}", database_path)
            })?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database; the single connection is never recycled
    /// because that would discard the data.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory connection string")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        tracing::info!("SQLite connection established, running migrations...");

        Self::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                email TEXT UNIQUE,
                first_name TEXT,
                last_name TEXT,
                role TEXT NOT NULL DEFAULT 'employee',
                manager_id INTEGER REFERENCES users(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                manager_id INTEGER NOT NULL REFERENCES users(id),
                employee_id INTEGER NOT NULL REFERENCES users(id),
                strengths TEXT NOT NULL,
                improvements TEXT NOT NULL,
                sentiment TEXT NOT NULL,
                acknowledged INTEGER NOT NULL DEFAULT 0,
                acknowledged_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_manager ON users(manager_id)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feedback_employee ON feedback(employee_id)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feedback_manager ON feedback(manager_id)")
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for Database {
    async fn create_user(&self, user: &NewUser) -> candor_core::Result<User> {
        let now = Utc::now();
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (username, password_hash, email, first_name, last_name,
                               role, manager_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.manager_id)
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.into())
    }

    async fn get_user(&self, id: UserId) -> candor_core::Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&*self.pool)
                .await
                .map_err(store_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_user_by_username(&self, username: &str) -> candor_core::Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"))
                .bind(username)
                .fetch_optional(&*self.pool)
                .await
                .map_err(store_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn update_user_role(
        &self,
        id: UserId,
        update: RoleUpdate,
    ) -> candor_core::Result<Option<User>> {
        let update = update.normalized();
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET role = ?1, manager_id = ?2, updated_at = ?3
            WHERE id = ?4
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(update.role.as_str())
        .bind(update.manager_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_users(&self) -> candor_core::Result<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .fetch_all(&*self.pool)
                .await
                .map_err(store_error)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_team_members(&self, manager_id: UserId) -> candor_core::Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE manager_id = ?1 ORDER BY id"
        ))
        .bind(manager_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn seed_user(&self, user: &User) -> candor_core::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (id, username, password_hash, email, first_name,
                                         last_name, role, manager_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.manager_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl FeedbackStore for Database {
    async fn create_feedback(&self, feedback: &NewFeedback) -> candor_core::Result<Feedback> {
        let now = Utc::now();
        let row: FeedbackRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO feedback (manager_id, employee_id, strengths, improvements, sentiment,
                                  acknowledged, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(feedback.manager_id)
        .bind(feedback.employee_id)
        .bind(&feedback.strengths)
        .bind(&feedback.improvements)
        .bind(feedback.sentiment.as_str())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.into())
    }

    async fn get_feedback(&self, id: FeedbackId) -> candor_core::Result<Option<Feedback>> {
        let row: Option<FeedbackRow> =
            sqlx::query_as(&format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&*self.pool)
                .await
                .map_err(store_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_feedback(&self) -> candor_core::Result<Vec<Feedback>> {
        let rows: Vec<FeedbackRow> = sqlx::query_as(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(store_error)?;

        let mut feedback: Vec<Feedback> = rows.into_iter().map(|r| r.into()).collect();
        // Text timestamps do not always sort chronologically
        feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(feedback)
    }

    async fn update_feedback(
        &self,
        id: FeedbackId,
        patch: &FeedbackPatch,
    ) -> candor_core::Result<Option<Feedback>> {
        let row: Option<FeedbackRow> = sqlx::query_as(&format!(
            r#"
            UPDATE feedback SET
                strengths = COALESCE(?1, strengths),
                improvements = COALESCE(?2, improvements),
                sentiment = COALESCE(?3, sentiment),
                updated_at = ?4
            WHERE id = ?5
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(&patch.strengths)
        .bind(&patch.improvements)
        .bind(patch.sentiment.map(|s| s.as_str()))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn acknowledge_feedback(
        &self,
        id: FeedbackId,
        at: DateTime<Utc>,
    ) -> candor_core::Result<Option<Feedback>> {
        let row: Option<FeedbackRow> = sqlx::query_as(&format!(
            r#"
            UPDATE feedback SET
                acknowledged = 1,
                acknowledged_at = COALESCE(acknowledged_at, ?1),
                updated_at = CASE WHEN acknowledged THEN updated_at ELSE ?1 END
            WHERE id = ?2
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(at)
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|r| r.into()))
    }
}

#[async_trait]
impl Store for Database {
    async fn ping(&self) -> candor_core::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

/// Constraint failures are the caller's problem; anything else means the
/// store could not serve the request.
fn store_error(e: sqlx::Error) -> CandorError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return CandorError::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return CandorError::validation("Referenced user does not exist");
        }
    }
    CandorError::StoreUnavailable(e.to_string())
}

// Helper structs for sqlx query_as
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    manager_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            role: parse_role(&r.role),
            manager_id: r.manager_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: i64,
    manager_id: i64,
    employee_id: i64,
    strengths: String,
    improvements: String,
    sentiment: String,
    acknowledged: bool,
    acknowledged_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(r: FeedbackRow) -> Self {
        Feedback {
            id: r.id,
            manager_id: r.manager_id,
            employee_id: r.employee_id,
            strengths: r.strengths,
            improvements: r.improvements,
            sentiment: parse_sentiment(&r.sentiment),
            acknowledged: r.acknowledged,
            acknowledged_at: r.acknowledged_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

fn parse_role(s: &str) -> Role {
    s.parse().unwrap_or_else(|_| {
        tracing::warn!("Unknown role '{}' in users table, treating as employee", s);
        Role::Employee
    })
}

fn parse_sentiment(s: &str) -> Sentiment {
    s.parse().unwrap_or_else(|_| {
        tracing::warn!("Unknown sentiment '{}' in feedback table, treating as neutral", s);
        Sentiment::Neutral
    })
}
