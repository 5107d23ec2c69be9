//! Store trait for users and sessions
//!
//! The `Store` trait abstracts over the relational backend, allowing the
//! same registry and session logic to run against SQLite (single node,
//! tests) or PostgreSQL.

use async_trait::async_trait;

use crate::{
    Result,
    types::{AnonymousUser, Session, SessionId, UserId},
};

/// Persistence seam for anonymous users and sessions
///
/// Implementations:
/// - `SqliteStore`: SQLite via sqlx
/// - `PostgresStore`: PostgreSQL via sqlx
///
/// Every write is committed before the method returns. Rows are never
/// updated or deleted through this trait.
///
/// # Example
/// ```no_run
/// # use loglane_core::{AnonymousUser, Store, timestamp_now};
/// # async fn example(store: &dyn Store) -> loglane_core::Result<()> {
/// let user = AnonymousUser::new("3f1c...".to_string(), timestamp_now());
/// store.insert_user(&user).await?;
/// assert!(store.user_exists(&user.user_id).await?);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a new anonymous user
    ///
    /// # Errors
    /// - `Error::Persistence` if the insert fails (including duplicate ids)
    async fn insert_user(&self, user: &AnonymousUser) -> Result<()>;

    /// Look up a user by id
    ///
    /// # Errors
    /// - `Error::Persistence` for read errors
    async fn get_user(&self, user_id: &UserId) -> Result<Option<AnonymousUser>>;

    /// Persist a new session
    ///
    /// # Errors
    /// - `Error::Persistence` if the insert fails (including duplicate ids)
    async fn insert_session(&self, session: &Session) -> Result<()>;

    /// Look up a session by id
    ///
    /// # Errors
    /// - `Error::Persistence` for read errors or a row whose derived names
    ///   do not match its ids
    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>>;

    /// Check whether a user exists
    async fn user_exists(&self, user_id: &UserId) -> Result<bool> {
        Ok(self.get_user(user_id).await?.is_some())
    }

    /// Round-trip to the backend, used by the readiness probe
    async fn ping(&self) -> Result<()>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}
