//! HTTP routes for user, session and log upload endpoints

use axum::{
    Extension, Json, Router,
    extract::{
        DefaultBodyLimit, Query, State,
        rejection::QueryRejection,
    },
    http::HeaderMap,
    middleware,
    routing::post,
};
use loglane_core::{Error, SessionId, UserId};
use loglane_observability::{HealthState, health_router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::endpoint::IngestReceipt;
use crate::middleware::{ClientAddressPolicy, RequestMetadataExt, request_context_middleware};
use crate::state::{AppState, StoreReadiness};
use crate::types::{ApiError, ApiResult, LogBatch};

pub const USER_ID_HEADER: &str = "user-id";

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    session_id: Option<String>,
    tag: Option<String>,
}

/// Build the full application router, health endpoints included
pub fn router(state: AppState) -> Router {
    let health = HealthState::with_readiness_checker(
        Arc::clone(&state.metrics),
        Arc::new(StoreReadiness::new(Arc::clone(&state.store))),
    );
    let policy = ClientAddressPolicy {
        trust_forwarded_headers: state.config.trust_forwarded_headers,
    };
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/user/create", post(create_user))
        .route("/session/create", post(create_session))
        .route("/session/upload", post(upload_logs))
        .with_state(state)
        .merge(health_router(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            policy,
            request_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

async fn create_user(
    State(state): State<AppState>,
    Extension(RequestMetadataExt(metadata)): Extension<RequestMetadataExt>,
) -> ApiResult<Json<CreateUserResponse>> {
    state
        .observe("user_create", async {
            let client_ip = metadata.client_ip.as_deref().ok_or_else(|| {
                Error::Validation("client address could not be determined".to_string())
            })?;
            let user_id = state.registry.create_user(client_ip).await?;
            Ok(Json(CreateUserResponse { user_id }))
        })
        .await
}

async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<CreateSessionResponse>> {
    state
        .observe("session_create", async {
            let user_id = headers
                .get(USER_ID_HEADER)
                .ok_or_else(|| Error::Validation("missing User-Id header".to_string()))?
                .to_str()
                .map_err(|_| Error::Validation("User-Id header is not valid text".to_string()))?;

            let session = state.sessions.create_session(user_id).await?;
            Ok(Json(CreateSessionResponse {
                session_id: session.session_id().clone(),
            }))
        })
        .await
}

async fn upload_logs(
    State(state): State<AppState>,
    params: Result<Query<UploadParams>, QueryRejection>,
    body: Result<LogBatch, ApiError>,
) -> ApiResult<Json<IngestReceipt>> {
    state
        .observe("session_upload", async {
            let batch = async {
                let Query(params) = params?;
                let LogBatch(logs) = body?;
                let session_id = params
                    .session_id
                    .ok_or_else(|| Error::Validation("missing session_id".to_string()))?;
                let tag = params
                    .tag
                    .ok_or_else(|| Error::Validation("missing tag".to_string()))?;
                Ok::<_, ApiError>((session_id, tag, logs))
            };

            let (session_id, tag, logs) = match batch.await {
                Ok(batch) => batch,
                Err(err) => {
                    state.metrics.record_batch_rejected();
                    return Err(err);
                }
            };

            let receipt = state.endpoint.ingest(&session_id, &tag, &logs).await?;
            Ok(Json(receipt))
        })
        .await
}
