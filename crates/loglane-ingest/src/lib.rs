//! Loglane Ingestion Service
//!
//! This crate provides the request-path components and their HTTP surface:
//! - `IdentityRegistry`: anonymous users keyed by a hashed client address
//! - `SessionManager`: sessions with derived subject/stream names
//! - `IngestionCounter`: the process-wide running total of ingested entries
//! - `IngestionEndpoint`: batch validation, diagnostics and counting
//! - Request context middleware and the axum router

pub mod counter;
pub mod endpoint;
pub mod hashing;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod types;

#[cfg(test)]
mod testing;

pub use counter::IngestionCounter;
pub use endpoint::{IngestReceipt, IngestionEndpoint};
pub use hashing::{IpHashAlgorithm, IpHasher};
pub use registry::IdentityRegistry;
pub use routes::router;
pub use sessions::SessionManager;
pub use state::{AppState, IngestConfig, StoreReadiness};
pub use types::{ApiError, ApiResult, LogBatch, RequestId, RequestMetadata};
