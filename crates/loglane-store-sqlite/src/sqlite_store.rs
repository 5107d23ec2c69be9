//! SqliteStore - Store trait implementation for SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use loglane_core::{
    AnonymousUser, Error, Result, Session, SessionId, SessionRecord, Store, UserId,
};

const SCHEMA_VERSION: i32 = 1;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite-backed store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect using a `sqlite:` URL and bootstrap the schema
    ///
    /// `sqlite::memory:` opens a private in-memory database held by a single
    /// pooled connection.
    ///
    /// # Errors
    /// - `Error::Config` if the URL cannot be parsed
    /// - `Error::Persistence` if the connection or schema bootstrap fails
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_max_connections(url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Same as [`SqliteStore::connect`] with an explicit pool size
    pub async fn connect_with_max_connections(url: &str, max_connections: u32) -> Result<Self> {
        if !url.starts_with("sqlite:") {
            return Err(Error::Config(format!(
                "Not a SQLite URL (expected sqlite:...): {}",
                url
            )));
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Config(format!("Invalid SQLite URL '{}': {}", url, e)))?;

        if is_memory_url(url) {
            return Self::with_options(options, 1, true).await;
        }

        Self::with_options(options, max_connections.max(1), false).await
    }

    /// Open (or create) a database file at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(path);
        Self::with_options(options, DEFAULT_MAX_CONNECTIONS, false).await
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn with_options(
        options: SqliteConnectOptions,
        max_connections: u32,
        in_memory: bool,
    ) -> Result<Self> {
        let options = options
            .create_if_missing(true)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal);

        let options = if in_memory {
            options
        } else {
            // Create directory if needed
            if let Some(parent) = options.get_filename().parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            options.journal_mode(SqliteJournalMode::Wal)
        };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            // The database lives only as long as its connection
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| Error::persistence("Failed to open SQLite database", e))?;

        Self::initialize_schema(&pool).await?;

        // Verify schema version
        let version: i32 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(&pool)
            .await
            .map_err(|e| Error::persistence("Failed to read schema version", e))?;

        if version != SCHEMA_VERSION {
            return Err(Error::Persistence(format!(
                "Unsupported schema version: {}",
                version
            )));
        }

        info!(in_memory, max_connections, "SQLite store ready");

        Ok(Self { pool })
    }

    async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
        debug!("Bootstrapping SQLite schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::persistence("Failed to create schema_version table", e))?;

        sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
            .bind(SCHEMA_VERSION)
            .execute(pool)
            .await
            .map_err(|e| Error::persistence("Failed to record schema version", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS anonymous_users (
                user_id TEXT PRIMARY KEY,
                hashed_ip TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::persistence("Failed to create anonymous_users table", e))?;

        // No foreign key on user_id: sessions may reference ids that were
        // accepted without an existence check.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                enable_sharing BOOLEAN NOT NULL DEFAULT 0,
                subject_name TEXT NOT NULL,
                stream_name TEXT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::persistence("Failed to create sessions table", e))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
            .execute(pool)
            .await
            .map_err(|e| Error::persistence("Failed to create sessions index", e))?;

        Ok(())
    }

    /// Underlying pool, for tests and maintenance queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn user_from_row(row: &SqliteRow) -> Result<AnonymousUser> {
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| Error::persistence("Failed to decode user row", e))?;
    let hashed_ip: String = row
        .try_get("hashed_ip")
        .map_err(|e| Error::persistence("Failed to decode user row", e))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| Error::persistence("Failed to decode user row", e))?;

    Ok(AnonymousUser {
        user_id: UserId::parse(&user_id)
            .map_err(|e| Error::persistence("Corrupt user row", e))?,
        hashed_ip,
        created_at,
    })
}

fn session_from_row(row: &SqliteRow) -> Result<Session> {
    let decode = |e: sqlx::Error| Error::persistence("Failed to decode session row", e);

    let record = SessionRecord {
        session_id: row.try_get("session_id").map_err(decode)?,
        user_id: row.try_get("user_id").map_err(decode)?,
        enable_sharing: row.try_get("enable_sharing").map_err(decode)?,
        subject_name: row.try_get("subject_name").map_err(decode)?,
        stream_name: row.try_get("stream_name").map_err(decode)?,
        expires_at: row.try_get("expires_at").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    };

    Session::from_record(record)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_user(&self, user: &AnonymousUser) -> Result<()> {
        sqlx::query(
            "INSERT INTO anonymous_users (user_id, hashed_ip, created_at) VALUES (?, ?, ?)",
        )
        .bind(user.user_id.as_str())
        .bind(&user.hashed_ip)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::persistence("Failed to insert user", e))?;

        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<AnonymousUser>> {
        let row = sqlx::query(
            "SELECT user_id, hashed_ip, created_at FROM anonymous_users WHERE user_id = ?",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
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
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.session_id)
        .bind(&record.user_id)
        .bind(record.enable_sharing)
        .bind(&record.subject_name)
        .bind(&record.stream_name)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
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
            WHERE session_id = ?
            "#,
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::persistence("Failed to load session", e))?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM anonymous_users WHERE user_id = ?")
                .bind(user_id.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Error::persistence("Failed to check user", e))?;

        Ok(count > 0)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::persistence("SQLite ping failed", e))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
