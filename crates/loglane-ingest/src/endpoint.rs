//! Log batch ingestion

use loglane_core::{Error, LogEntry, Result, SessionId, timestamp_now};
use loglane_observability::Metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::counter::IngestionCounter;
use crate::sessions::SessionManager;

/// Longest message prefix written to logs when payload logging is on
pub const PAYLOAD_LOG_LIMIT: usize = 128;

/// Result of an accepted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// Entries in this batch
    pub accepted: u64,
    /// Counter value right after this batch was added
    pub total: u64,
}

/// Accepts batches of log entries for a session and counts them
///
/// Entries are inspected for diagnostics and counted, never stored.
pub struct IngestionEndpoint {
    sessions: Arc<SessionManager>,
    counter: Arc<IngestionCounter>,
    metrics: Arc<Metrics>,
    log_payloads: bool,
}

impl IngestionEndpoint {
    pub fn new(
        sessions: Arc<SessionManager>,
        counter: Arc<IngestionCounter>,
        metrics: Arc<Metrics>,
        log_payloads: bool,
    ) -> Self {
        Self {
            sessions,
            counter,
            metrics,
            log_payloads,
        }
    }

    /// Ingest one batch
    ///
    /// The counter moves by the full batch length or not at all. An empty
    /// batch succeeds and leaves it unchanged.
    ///
    /// # Errors
    /// - `Error::Validation` for an empty session id or tag, or an unknown
    ///   session when references are verified
    /// - `Error::Persistence` if the session lookup fails
    /// - `Error::Concurrency` if the counter cannot be locked
    pub async fn ingest(
        &self,
        session_id: &str,
        tag: &str,
        logs: &[LogEntry],
    ) -> Result<IngestReceipt> {
        let result = self.try_ingest(session_id, tag, logs).await;
        match &result {
            Ok(receipt) => self
                .metrics
                .record_batch_accepted(receipt.accepted, receipt.total),
            Err(_) => self.metrics.record_batch_rejected(),
        }
        result
    }

    async fn try_ingest(
        &self,
        session_id: &str,
        tag: &str,
        logs: &[LogEntry],
    ) -> Result<IngestReceipt> {
        let session_id = SessionId::parse(session_id)?;
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::Validation("tag must not be empty".to_string()));
        }

        if self.sessions.verifies_references() {
            let session = self
                .sessions
                .get_session(&session_id)
                .await?
                .ok_or_else(|| Error::Validation(format!("unknown session id '{}'", session_id)))?;

            if session.is_expired(timestamp_now()) {
                warn!(
                    session_id = %session_id,
                    expired_at = %session.expires_at(),
                    "Accepting logs for expired session"
                );
            }
        }

        self.log_batch_edges(&session_id, tag, logs);

        let accepted = logs.len() as u64;
        let total = self.counter.add_entries(accepted)?;

        info!(
            session_id = %session_id,
            tag = %tag,
            accepted,
            total,
            "Ingested log batch"
        );

        Ok(IngestReceipt { accepted, total })
    }

    fn log_batch_edges(&self, session_id: &SessionId, tag: &str, logs: &[LogEntry]) {
        let (Some(first), Some(last)) = (logs.first(), logs.last()) else {
            debug!(session_id = %session_id, tag = %tag, "Empty log batch");
            return;
        };

        if self.log_payloads {
            debug!(
                session_id = %session_id,
                tag = %tag,
                first = %truncate(&first.message, PAYLOAD_LOG_LIMIT),
                last = %truncate(&last.message, PAYLOAD_LOG_LIMIT),
                "Log batch edges"
            );
        } else {
            debug!(
                session_id = %session_id,
                tag = %tag,
                first_len = first.message.len(),
                last_len = last.message.len(),
                "Log batch edges"
            );
        }
    }
}

/// First `max` characters of `s`, respecting char boundaries
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use chrono::Duration;
    use loglane_core::{Session, Store, UserId};

    struct Fixture {
        store: Arc<MemoryStore>,
        counter: Arc<IngestionCounter>,
        metrics: Arc<Metrics>,
        endpoint: IngestionEndpoint,
    }

    fn fixture(store: MemoryStore, verify: bool) -> Fixture {
        let store = Arc::new(store);
        let metrics = Arc::new(Metrics::new().unwrap());
        let counter = Arc::new(IngestionCounter::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::clone(&metrics),
            verify,
        ));
        let endpoint = IngestionEndpoint::new(
            sessions,
            Arc::clone(&counter),
            Arc::clone(&metrics),
            false,
        );
        Fixture {
            store,
            counter,
            metrics,
            endpoint,
        }
    }

    async fn seeded_session(store: &MemoryStore) -> Session {
        let session = Session::new(UserId::generate(), timestamp_now());
        store.insert_session(&session).await.unwrap();
        session
    }

    fn batch(n: usize) -> Vec<LogEntry> {
        (0..n).map(|i| LogEntry::new(format!("line {}", i))).collect()
    }

    #[tokio::test]
    async fn test_ingest_counts_batch() {
        let f = fixture(MemoryStore::default(), true);
        let session = seeded_session(&f.store).await;

        let receipt = f
            .endpoint
            .ingest(session.session_id().as_str(), "t1", &batch(3))
            .await
            .unwrap();

        assert_eq!(receipt, IngestReceipt { accepted: 3, total: 3 });
        assert_eq!(f.counter.total().unwrap(), 3);
        assert_eq!(f.metrics.log_entries_total.get(), 3);
    }

    #[tokio::test]
    async fn test_empty_batch_leaves_counter_unchanged() {
        let f = fixture(MemoryStore::default(), true);
        let session = seeded_session(&f.store).await;
        f.counter.add_entries(5).unwrap();

        let receipt = f
            .endpoint
            .ingest(session.session_id().as_str(), "t1", &[])
            .await
            .unwrap();

        assert_eq!(receipt, IngestReceipt { accepted: 0, total: 5 });
        assert_eq!(f.counter.total().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_missing_tag_or_session_rejected() {
        let f = fixture(MemoryStore::default(), true);
        let session = seeded_session(&f.store).await;

        let err = f
            .endpoint
            .ingest(session.session_id().as_str(), " ", &batch(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = f.endpoint.ingest("", "t1", &batch(2)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert_eq!(f.counter.total().unwrap(), 0);
        assert_eq!(
            f.metrics
                .ingest_batches_total
                .with_label_values(&["rejected"])
                .get(),
            2
        );
    }

    #[tokio::test]
    async fn test_unknown_session_rejected_when_verifying() {
        let f = fixture(MemoryStore::default(), true);

        let err = f
            .endpoint
            .ingest("no-such-session", "t1", &batch(4))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(f.counter.total().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session_accepted_when_not_verifying() {
        let f = fixture(MemoryStore::failing(), false);

        let receipt = f
            .endpoint
            .ingest("free-form", "t1", &batch(4))
            .await
            .unwrap();
        assert_eq!(receipt.total, 4);
    }

    #[tokio::test]
    async fn test_expired_session_still_accepted() {
        let f = fixture(MemoryStore::default(), true);
        let session = Session::new(UserId::generate(), timestamp_now() - Duration::days(3));
        f.store.insert_session(&session).await.unwrap();
        assert!(session.is_expired(timestamp_now()));

        let receipt = f
            .endpoint
            .ingest(session.session_id().as_str(), "late", &batch(2))
            .await
            .unwrap();
        assert_eq!(receipt.accepted, 2);
    }

    #[tokio::test]
    async fn test_lookup_failure_leaves_counter_untouched() {
        let f = fixture(MemoryStore::failing(), true);

        let err = f
            .endpoint
            .ingest("any", "t1", &batch(4))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(f.counter.total().unwrap(), 0);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 2), "he");
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("", 3), "");
    }
}
