//! Application state shared by all handlers

use async_trait::async_trait;
use loglane_core::Store;
use loglane_observability::{ComponentStatus, Metrics, ReadinessChecker};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::counter::IngestionCounter;
use crate::endpoint::IngestionEndpoint;
use crate::hashing::IpHasher;
use crate::registry::IdentityRegistry;
use crate::sessions::SessionManager;
use crate::types::ApiResult;

/// Request-path settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Require referenced users and sessions to exist
    pub verify_references: bool,
    /// Take the client address from forwarding headers
    pub trust_forwarded_headers: bool,
    /// Maximum accepted request body
    pub max_body_bytes: usize,
    /// Write truncated message content to DEBUG logs (set from the logging section)
    #[serde(skip)]
    pub log_payloads: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            verify_references: true,
            trust_forwarded_headers: false,
            max_body_bytes: 2 * 1024 * 1024,
            log_payloads: false,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<IdentityRegistry>,
    pub sessions: Arc<SessionManager>,
    pub endpoint: Arc<IngestionEndpoint>,
    pub counter: Arc<IngestionCounter>,
    pub metrics: Arc<Metrics>,
    pub store: Arc<dyn Store>,
    pub config: IngestConfig,
}

impl AppState {
    /// Wire the components around one store and one counter
    pub fn new(
        store: Arc<dyn Store>,
        hasher: IpHasher,
        metrics: Arc<Metrics>,
        config: IngestConfig,
    ) -> Self {
        let counter = Arc::new(IngestionCounter::new());
        let registry = Arc::new(IdentityRegistry::new(
            Arc::clone(&store),
            hasher,
            Arc::clone(&metrics),
        ));
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&store),
            Arc::clone(&metrics),
            config.verify_references,
        ));
        let endpoint = Arc::new(IngestionEndpoint::new(
            Arc::clone(&sessions),
            Arc::clone(&counter),
            Arc::clone(&metrics),
            config.log_payloads,
        ));

        Self {
            registry,
            sessions,
            endpoint,
            counter,
            metrics,
            store,
            config,
        }
    }

    /// Time a handler body and count its failure, if any
    pub(crate) async fn observe<T, F>(&self, endpoint: &'static str, fut: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        let started = Instant::now();
        let result = fut.await;
        self.metrics
            .observe_request(endpoint, started.elapsed().as_secs_f64());
        if let Err(err) = &result {
            self.metrics.record_error(endpoint, err.kind().as_str());
        }
        result
    }
}

/// Readiness backed by a store ping
pub struct StoreReadiness {
    store: Arc<dyn Store>,
}

impl StoreReadiness {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReadinessChecker for StoreReadiness {
    async fn check(&self) -> Vec<ComponentStatus> {
        let name = format!("database:{}", self.store.backend());
        match self.store.ping().await {
            Ok(()) => vec![ComponentStatus::healthy(name)],
            Err(err) => vec![ComponentStatus::unhealthy(name, err.to_string())],
        }
    }
}
