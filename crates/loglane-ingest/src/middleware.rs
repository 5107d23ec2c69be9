//! Request context middleware

use crate::types::{RequestId, RequestMetadata};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::{Instrument, info_span};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extension key for request metadata
#[derive(Clone)]
pub struct RequestMetadataExt(pub RequestMetadata);

/// Where the client address may be taken from
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientAddressPolicy {
    /// Honor `X-Forwarded-For` / `X-Real-IP` (only behind a trusted proxy)
    pub trust_forwarded_headers: bool,
}

/// Attach request metadata to the request and an `x-request-id` to the response
pub async fn request_context_middleware(
    State(policy): State<ClientAddressPolicy>,
    mut req: Request,
    next: Next,
) -> Response {
    let headers = req.headers();

    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(RequestId::from_header)
        .unwrap_or_else(RequestId::generate);

    let mut metadata = RequestMetadata::new(request_id.clone());

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    if let Some(ip) = resolve_client_ip(req.headers(), peer, policy) {
        metadata = metadata.with_client_ip(ip);
    }

    if let Some(user_agent) = req.headers().get(header::USER_AGENT)
        && let Ok(ua) = user_agent.to_str()
    {
        metadata = metadata.with_user_agent(ua);
    }

    req.extensions_mut().insert(RequestMetadataExt(metadata));

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path()
    );
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Pick the client address: forwarded headers first when trusted, then the peer
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<String>,
    policy: ClientAddressPolicy,
) -> Option<String> {
    if policy.trust_forwarded_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = real_ip {
            return Some(ip.to_string());
        }
    }

    peer
}
