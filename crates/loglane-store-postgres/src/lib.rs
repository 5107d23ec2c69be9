//! PostgreSQL-backed storage for Loglane deployments
//!
//! This crate implements the `Store` trait using PostgreSQL through sqlx.
//! Schema changes are applied as numbered migrations on connect and recorded
//! in a `schema_migrations` table, so every migration runs exactly once.
//!
//! # Example
//! ```no_run
//! # use loglane_store_postgres::PostgresStore;
//! # async fn example() -> loglane_core::Result<()> {
//! let store = PostgresStore::new("postgres://localhost/loglane").await?;
//! # Ok(())
//! # }
//! ```

mod config;
pub mod migrations;
mod postgres_store;

pub use config::PostgresStoreConfig;
pub use postgres_store::PostgresStore;
