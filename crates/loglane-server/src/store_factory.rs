//! Store factory
//!
//! Opens the `Store` implementation matching the database URL scheme and
//! bootstraps its schema.

use loglane_core::{Result, Store};
use loglane_store_sqlite::SqliteStore;
use std::sync::Arc;
#[cfg(feature = "postgres")]
use std::time::Duration;

use crate::config::{DatabaseBackend, DatabaseConfig};

/// Connect to the configured database and make sure the schema exists
///
/// # Errors
/// - `Error::Config` if the backend is not compiled in
/// - `Error::Persistence` if connecting or schema bootstrap fails
pub async fn create_store(
    config: &DatabaseConfig,
    backend: DatabaseBackend,
) -> Result<Arc<dyn Store>> {
    match backend {
        DatabaseBackend::Sqlite => {
            tracing::info!("Initializing SQLite store");
            let store =
                SqliteStore::connect_with_max_connections(&config.url, config.max_connections)
                    .await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        DatabaseBackend::Postgres => {
            tracing::info!("Initializing PostgreSQL store");
            let store = loglane_store_postgres::PostgresStore::with_config(
                &config.url,
                postgres_pool_config(config),
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        DatabaseBackend::Postgres => Err(loglane_core::Error::Config(
            "PostgreSQL support is not compiled in. Rebuild with the postgres feature.".to_string(),
        )),
    }
}

#[cfg(feature = "postgres")]
fn postgres_pool_config(config: &DatabaseConfig) -> loglane_store_postgres::PostgresStoreConfig {
    loglane_store_postgres::PostgresStoreConfig::default()
        .with_max_connections(config.max_connections)
        .with_min_connections(1)
        .with_acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .with_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .with_max_lifetime(Duration::from_secs(config.max_lifetime_secs))
}
