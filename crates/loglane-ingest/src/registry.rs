//! Anonymous identity creation

use loglane_core::{AnonymousUser, Result, Store, UserId, timestamp_now};
use loglane_observability::Metrics;
use std::sync::Arc;
use tracing::{debug, info};

use crate::hashing::IpHasher;

/// Mints anonymous users keyed by a hash of the client address
pub struct IdentityRegistry {
    store: Arc<dyn Store>,
    hasher: IpHasher,
    metrics: Arc<Metrics>,
}

impl IdentityRegistry {
    pub fn new(store: Arc<dyn Store>, hasher: IpHasher, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            hasher,
            metrics,
        }
    }

    /// Create and persist a new anonymous user for `client_address`
    ///
    /// Each call yields a fresh id, even for a repeated address. The raw
    /// address is neither stored nor logged.
    ///
    /// # Errors
    /// - `Error::Validation` if the address is empty
    /// - `Error::Persistence` if the store rejects the insert
    pub async fn create_user(&self, client_address: &str) -> Result<UserId> {
        let hashed_ip = self.hasher.hash(client_address)?;
        let user = AnonymousUser::new(hashed_ip, timestamp_now());

        self.store.insert_user(&user).await?;
        self.metrics.record_user_created();

        info!(user_id = %user.user_id, "Created anonymous user");
        debug!(hashed_ip = %user.hashed_ip, backend = self.store.backend(), "User persisted");

        Ok(user.user_id)
    }
}
