//! PostgresStore - Store trait implementation for PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::info;

use crate::config::PostgresStoreConfig;
use crate::migrations;
use loglane_core::{
    AnonymousUser, Error, Result, Session, SessionId, SessionRecord, Store, UserId,
};

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    /// Connect with default pool configuration and run migrations
    ///
    /// # Errors
    /// - `Error::Persistence` if connection or schema migration fails
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_config(database_url, PostgresStoreConfig::default()).await
    }

    /// Connect with custom pool configuration and run migrations
    ///
    /// # Example
    /// ```no_run
    /// # use loglane_store_postgres::{PostgresStore, PostgresStoreConfig};
    /// # async fn example() -> loglane_core::Result<()> {
    /// let config = PostgresStoreConfig::default().with_max_connections(50);
    /// let store = PostgresStore::with_config("postgres://localhost/loglane", config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_config(database_url: &str, config: PostgresStoreConfig) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect(database_url)
            .await
            .map_err(|e| Error::persistence("Failed to connect to PostgreSQL", e))?;

        let store = Self::from_pool(pool);
        migrations::run_migrations(&store.pool).await?;

        info!(
            max_connections = config.max_connections,
            "PostgreSQL store ready"
        );

        Ok(store)
    }

    /// Create from an existing pool without running migrations
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Highest applied migration, `None` on a database never migrated
    pub async fn schema_version(&self) -> Result<Option<i32>> {
        migrations::get_current_version(&self.pool).await
    }
}

fn user_from_row(row: &PgRow) -> Result<AnonymousUser> {
    let decode = |e: sqlx::Error| Error::persistence("Failed to decode user row", e);

    let user_id: String = row.try_get("user_id").map_err(decode)?;
    let hashed_ip: String = row.try_get("hashed_ip").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

    Ok(AnonymousUser {
        user_id: UserId::parse(&user_id).map_err(|e| Error::persistence("Corrupt user row", e))?,
        hashed_ip,
        created_at,
    })
}

fn session_from_row(row: &PgRow) -> Result<Session> {
    let decode = |e: sqlx::Error| Error::persistence("Failed to decode session row", e);

    Session::from_record(SessionRecord {
        session_id: row.try_get("session_id").map_err(decode)?,
        user_id: row.try_get("user_id").map_err(decode)?,
        enable_sharing: row.try_get("enable_sharing").map_err(decode)?,
        subject_name: row.try_get("subject_name").map_err(decode)?,
        stream_name: row.try_get("stream_name").map_err(decode)?,
        expires_at: row.try_get("expires_at").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_user(&self, user: &AnonymousUser) -> Result<()> {
        sqlx::query(
            "INSERT INTO anonymous_users (user_id, hashed_ip, created_at) VALUES ($1, $2, $3)",
        )
        .bind(user.user_id.as_str())
        .bind(&user.hashed_ip)
        .bind(user.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::persistence("Failed to insert user", e))?;

        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<AnonymousUser>> {
        let row = sqlx::query(
            "SELECT user_id, hashed_ip, created_at FROM anonymous_users WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::persistence("Failed to load user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.to_record();

        sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id, user_id, enable_sharing, subject_name, stream_name,
                expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.session_id)
        .bind(&record.user_id)
        .bind(record.enable_sharing)
        .bind(&record.subject_name)
        .bind(&record.stream_name)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::persistence("Failed to insert session", e))?;

        Ok(())
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, user_id, enable_sharing, subject_name, stream_name,
                   expires_at, created_at
            FROM sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::persistence("Failed to load session", e))?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM anonymous_users WHERE user_id = $1)")
            .bind(user_id.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::persistence("Failed to check user", e))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::persistence("PostgreSQL ping failed", e))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
