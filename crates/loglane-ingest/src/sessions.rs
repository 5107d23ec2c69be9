//! Session creation and lookup

use loglane_core::{Error, Result, Session, SessionId, Store, UserId, timestamp_now};
use loglane_observability::Metrics;
use std::sync::Arc;
use tracing::{debug, info};

/// Opens sessions for users and resolves them by id
pub struct SessionManager {
    store: Arc<dyn Store>,
    metrics: Arc<Metrics>,
    verify_references: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, metrics: Arc<Metrics>, verify_references: bool) -> Self {
        Self {
            store,
            metrics,
            verify_references,
        }
    }

    pub fn verifies_references(&self) -> bool {
        self.verify_references
    }

    /// Create and persist a session for `user_id`
    ///
    /// With reference verification on, the user must already exist.
    /// The id is used exactly as given, so `stream_name` keeps any padding.
    ///
    /// # Errors
    /// - `Error::Validation` if the id is empty or names an unknown user
    /// - `Error::Persistence` if the store fails
    pub async fn create_session(&self, user_id: &str) -> Result<Session> {
        let user_id = UserId::parse(user_id)?;

        if self.verify_references && !self.store.user_exists(&user_id).await? {
            return Err(Error::Validation(format!("unknown user id '{}'", user_id)));
        }

        let session = Session::new(user_id, timestamp_now());
        self.store.insert_session(&session).await?;
        self.metrics.record_session_created();

        info!(
            session_id = %session.session_id(),
            user_id = %session.user_id(),
            expires_at = %session.expires_at(),
            "Created session"
        );

        Ok(session)
    }

    /// Look up a session by id
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let session = self.store.get_session(session_id).await?;
        if session.is_none() {
            debug!(session_id = %session_id, "Session not found");
        }
        Ok(session)
    }
}
