//! Shared HTTP types: request metadata, the log batch extractor and the
//! API error body

use axum::{
    Json,
    body::Bytes,
    extract::{
        FromRequest, Request,
        rejection::{BytesRejection, JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use loglane_core::{Error, ErrorKind, LogEntry};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Request ID echoed back in the `x-request-id` header
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("req_{}", Uuid::new_v4().simple()))
    }

    /// Reuse a caller-supplied id if it is short and printable
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        let acceptable = !value.is_empty()
            && value.len() <= 128
            && value.chars().all(|c| c.is_ascii_graphic());
        acceptable.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request metadata collected by the request context middleware
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    pub request_id: RequestId,
    /// Resolved client address; hashed before it is stored, never logged
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMetadata {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            client_ip: None,
            user_agent: None,
        }
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Log batch from an upload body
///
/// With a `Content-Type` header the usual JSON content-type check applies.
/// Without one the body is parsed as JSON anyway.
#[derive(Debug)]
pub struct LogBatch(pub Vec<LogEntry>);

impl<S> FromRequest<S> for LogBatch
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.headers().contains_key(header::CONTENT_TYPE) {
            let Json(logs) = Json::<Vec<LogEntry>>::from_request(req, state).await?;
            return Ok(Self(logs));
        }

        let bytes = Bytes::from_request(req, state).await?;
        let logs = serde_json::from_slice(&bytes).map_err(Error::Serialization)?;
        Ok(Self(logs))
    }
}

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] Error),

    #[error("Request too large: {0}")]
    PayloadTooLarge(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Core(err) => err.kind(),
            ApiError::PayloadTooLarge(_) => ErrorKind::Validation,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Core(_) => match self.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Persistence | ErrorKind::Concurrency | ErrorKind::Internal => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::Core(Error::Validation(format!(
                "invalid log batch: {}",
                rejection.body_text()
            )))
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::Core(Error::Validation(format!(
                "unreadable request body: {}",
                rejection.body_text()
            )))
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Core(Error::Validation(format!(
            "invalid query: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = match &self {
            ApiError::Core(err) => err.to_string(),
            ApiError::PayloadTooLarge(_) => self.to_string(),
        };

        if status.is_server_error() {
            error!(kind = kind.as_str(), error = %message, "Request failed");
        } else {
            warn!(kind = kind.as_str(), error = %message, "Request rejected");
        }

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": kind.as_str(),
                "code": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
