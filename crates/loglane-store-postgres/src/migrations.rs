//! Versioned schema migrations for the PostgreSQL store
//!
//! Each migration is a single statement, applied inside a transaction
//! together with its `schema_migrations` row.

use loglane_core::{Error, Result};
use sqlx::PgPool;
use tracing::{debug, info};

/// Represents a single database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique version number (must be sequential)
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
}

/// All migrations in order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create anonymous_users table",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS anonymous_users (
                user_id TEXT PRIMARY KEY,
                hashed_ip TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
        "#,
    },
    Migration {
        version: 2,
        description: "Create sessions table",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                enable_sharing BOOLEAN NOT NULL DEFAULT FALSE,
                subject_name TEXT NOT NULL,
                stream_name TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
        "#,
    },
    Migration {
        version: 3,
        description: "Create sessions user index",
        up_sql: r#"
            CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions(user_id)
        "#,
    },
];

/// Run all pending migrations
///
/// Creates a `schema_migrations` table to track which migrations have been
/// applied, then runs any migrations that haven't been applied yet.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| Error::persistence("Failed to create schema_migrations table", e))?;

    let applied_versions: Vec<i32> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await
        .map_err(|e| Error::persistence("Failed to fetch applied migrations", e))?;

    debug!(
        "Found {} applied migrations: {:?}",
        applied_versions.len(),
        applied_versions
    );

    for migration in pending(&applied_versions) {
        info!(
            "Applying migration {}: {}",
            migration.version, migration.description
        );

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| Error::persistence("Failed to open migration transaction", e))?;

        sqlx::query(migration.up_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Persistence(format!(
                    "Failed to apply migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query(
            "INSERT INTO schema_migrations (version, description) VALUES ($1, $2)
                ON CONFLICT (version) DO NOTHING",
        )
        .bind(migration.version)
        .bind(migration.description)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Persistence(format!(
                "Failed to record migration {}: {}",
                migration.version, e
            ))
        })?;

        tx.commit().await.map_err(|e| {
            Error::Persistence(format!(
                "Failed to commit migration {}: {}",
                migration.version, e
            ))
        })?;
    }

    Ok(())
}

/// Migrations not yet present in `applied`, in version order
fn pending(applied: &[i32]) -> impl Iterator<Item = &'static Migration> + '_ {
    MIGRATIONS
        .iter()
        .filter(move |m| !applied.contains(&m.version))
}

/// Get the current schema version
pub async fn get_current_version(pool: &PgPool) -> Result<Option<i32>> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_name = 'schema_migrations'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| Error::persistence("Failed to check for schema_migrations table", e))?;

    if !table_exists {
        return Ok(None);
    }

    let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::persistence("Failed to get current schema version", e))?;

    Ok(version)
}
