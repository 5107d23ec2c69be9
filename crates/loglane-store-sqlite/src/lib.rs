//! SQLite storage for single-node Loglane deployments
//!
//! This crate implements the `Store` trait using SQLite through sqlx.
//! The schema is created on connect, so opening a fresh database file is
//! enough to start serving.
//!
//! # Example
//! ```no_run
//! # use loglane_store_sqlite::SqliteStore;
//! # async fn example() -> loglane_core::Result<()> {
//! let store = SqliteStore::connect("sqlite://./loglane.db").await?;
//! # Ok(())
//! # }
//! ```

mod sqlite_store;

pub use sqlite_store::SqliteStore;
