//! Loglane Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout Loglane:
//! - Anonymous user, session and log entry types
//! - The `Store` persistence abstraction
//! - Core error types

pub mod error;
pub mod store;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use store::Store;
pub use types::{
    AnonymousUser, LogEntry, SESSION_LIFETIME_DAYS, Session, SessionId, SessionRecord, UserId,
    timestamp_now,
};
