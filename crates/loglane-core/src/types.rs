//! Identity, session and log entry types

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Error, Result};

/// Sessions expire this many days after creation
pub const SESSION_LIFETIME_DAYS: i64 = 2;

const SUBJECT_PREFIX: &str = "subject-";
const STREAM_PREFIX: &str = "stream-";

/// Current time truncated to microseconds so timestamps survive a
/// round-trip through every supported store unchanged.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Opaque identifier of an anonymous user
///
/// Generated ids are UUID v4 strings, but ids supplied by clients are
/// accepted as arbitrary non-empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new random user ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a client-supplied user ID
    ///
    /// The value is kept verbatim, surrounding whitespace included; only
    /// blank input is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::Validation("user id must not be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random session ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a client-supplied session ID, kept verbatim
    pub fn parse(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::Validation(
                "session id must not be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An identity keyed only by a hashed client address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousUser {
    pub user_id: UserId,
    /// One-way hash of the client network address
    pub hashed_ip: String,
    pub created_at: DateTime<Utc>,
}

impl AnonymousUser {
    /// Create a user with a freshly generated id
    pub fn new(hashed_ip: String, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: UserId::generate(),
            hashed_ip,
            created_at,
        }
    }
}

/// Session row exactly as persisted
///
/// Stores read rows into this shape and hand them to [`Session::from_record`],
/// which re-checks the derived names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub enable_sharing: bool,
    pub subject_name: String,
    pub stream_name: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A bounded-lifetime context tied to one user
///
/// `subject_name` and `stream_name` are derived from the ids and have no
/// setters; the only way to obtain a `Session` is [`Session::new`] or
/// [`Session::from_record`], both of which uphold the derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    session_id: SessionId,
    user_id: UserId,
    enable_sharing: bool,
    subject_name: String,
    stream_name: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Open a new session for `user_id` at `now`
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        let session_id = SessionId::generate();
        Self {
            subject_name: Self::subject_name_for(&session_id),
            stream_name: Self::stream_name_for(&user_id),
            session_id,
            user_id,
            enable_sharing: false,
            expires_at: now + Duration::days(SESSION_LIFETIME_DAYS),
            created_at: now,
        }
    }

    /// Rebuild a session from a stored row
    ///
    /// # Errors
    /// - `Error::Persistence` if the stored names do not match the ids
    pub fn from_record(record: SessionRecord) -> Result<Self> {
        let session_id = SessionId::parse(&record.session_id)
            .map_err(|e| Error::persistence("Corrupt session row", e))?;
        let user_id = UserId::parse(&record.user_id)
            .map_err(|e| Error::persistence("Corrupt session row", e))?;

        let subject_name = Self::subject_name_for(&session_id);
        let stream_name = Self::stream_name_for(&user_id);
        if record.subject_name != subject_name || record.stream_name != stream_name {
            return Err(Error::Persistence(format!(
                "Session {} has derived names that do not match its ids",
                session_id
            )));
        }

        Ok(Self {
            session_id,
            user_id,
            enable_sharing: record.enable_sharing,
            subject_name,
            stream_name,
            expires_at: record.expires_at,
            created_at: record.created_at,
        })
    }

    pub fn subject_name_for(session_id: &SessionId) -> String {
        format!("{}{}", SUBJECT_PREFIX, session_id)
    }

    pub fn stream_name_for(user_id: &UserId) -> String {
        format!("{}{}", STREAM_PREFIX, user_id)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn enable_sharing(&self) -> bool {
        self.enable_sharing
    }

    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expiry is advisory; nothing evicts expired sessions.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            session_id: self.session_id.to_string(),
            user_id: self.user_id.to_string(),
            enable_sharing: self.enable_sharing,
            subject_name: self.subject_name.clone(),
            stream_name: self.stream_name.clone(),
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

/// A single uploaded log line
///
/// Only `message` is required; any other fields are carried through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: serde_json::Map::new(),
        }
    }
}
