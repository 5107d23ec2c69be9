//! In-memory store for unit tests

use async_trait::async_trait;
use loglane_core::{AnonymousUser, Error, Result, Session, SessionId, Store, UserId};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<UserId, AnonymousUser>>,
    sessions: Mutex<HashMap<SessionId, Session>>,
    fail: bool,
}

impl MemoryStore {
    /// A store whose every operation fails with a persistence error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            Err(Error::Persistence("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &AnonymousUser) -> Result<()> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.user_id) {
            return Err(Error::Persistence("duplicate user id".to_string()));
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<AnonymousUser>> {
        self.check()?;
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.check()?;
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(session.session_id()) {
            return Err(Error::Persistence("duplicate session id".to_string()));
        }
        sessions.insert(session.session_id().clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        self.check()?;
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
