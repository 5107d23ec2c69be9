//! Error types for Loglane Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input, including references to unknown users or sessions
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backing store rejected or could not perform a read or write
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The shared ingestion counter could not be locked
    #[error("Concurrency fault: {0}")]
    Concurrency(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for status codes, error bodies and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Persistence,
    Concurrency,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Persistence => "persistence_error",
            ErrorKind::Concurrency => "concurrency_fault",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Serialization(_) => ErrorKind::Validation,
            Error::Persistence(_) => ErrorKind::Persistence,
            Error::Concurrency(_) => ErrorKind::Concurrency,
            Error::Config(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Wrap a driver error as a persistence failure with context
    pub fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Persistence(format!("{}: {}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
