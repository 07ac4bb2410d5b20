//! Core HTTP relay handler.
//!
//! The [`relay_handler`] function is the Axum fallback that receives
//! every non-`/health` request, gates it against the configured prefix
//! and method set, forwards it to the upstream origin, and translates
//! the enveloped response into the response returned to the caller.
//! Submodules handle prefix gating ([`routing`]), header preparation
//! ([`headers`]), the outbound exchange ([`upstream`]), and the response
//! contract ([`envelope`]).

pub mod envelope;
pub mod headers;
pub mod routing;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper::header::{ALLOW, CONTENT_TYPE};

use crate::config::model::Config;
use crate::error::RelayError;
use crate::server::AppState;

use self::envelope::Envelope;

#[allow(clippy::significant_drop_tightening)]
pub async fn relay_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path();
    let request_id = uuid::Uuid::new_v4().to_string();

    // Clone the Arc<Config> (cheap refcount bump) to release the RwLock before .await
    let config = {
        let config_guard = state.config.read().await;
        Arc::clone(&config_guard.config)
    };

    let Some(upstream_path) = routing::match_prefix(&config.relay, path) else {
        tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            "path outside relay prefix"
        );
        return StatusCode::NOT_FOUND.into_response();
    };

    if !routing::method_allowed(&config.relay, method.as_str()) {
        tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            "method not allowed"
        );
        let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
        if let Ok(val) = HeaderValue::from_str(&routing::allow_header(&config.relay)) {
            response.headers_mut().insert(ALLOW, val);
        }
        return response;
    }

    let outbound_body = if routing::accepts_body(method.as_str()) {
        parse_body(&body, &request_id)
    } else {
        None
    };

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client_ip = %addr.ip(),
        has_body = outbound_body.is_some(),
        "relaying request"
    );

    let request = RelayRequest {
        method: &method,
        path: upstream_path,
        query: uri.query(),
        headers: &req_headers,
        body: outbound_body,
        request_id: &request_id,
    };

    match exchange(&state, &config, request).await {
        Ok(response) => {
            state.stats.relayed.fetch_add(1, Ordering::Relaxed);
            response
        }
        Err(error) => {
            match &error {
                RelayError::Rejected { .. } => {
                    state.stats.rejected.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        request_id = %request_id,
                        error = %error,
                        "upstream rejected request"
                    );
                }
                RelayError::UpstreamStatus { status } => {
                    state.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        request_id = %request_id,
                        status = status.as_u16(),
                        "upstream returned error status"
                    );
                }
                _ => {
                    state.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        request_id = %request_id,
                        error = %error,
                        "relay failed"
                    );
                }
            }
            error.into_response()
        }
    }
}

struct RelayRequest<'a> {
    method: &'a Method,
    path: &'a str,
    query: Option<&'a str>,
    headers: &'a HeaderMap,
    body: Option<Bytes>,
    request_id: &'a str,
}

/// Forward one gated request and translate the enveloped response.
///
/// A non-2xx upstream status short-circuits to [`RelayError::UpstreamStatus`]
/// without reading the envelope. A 2xx body must carry the envelope; its
/// payload becomes the response body and the upstream headers are
/// propagated after sanitizing.
async fn exchange(
    state: &AppState,
    config: &Config,
    req: RelayRequest<'_>,
) -> Result<Response, RelayError> {
    let uri = upstream::target_uri(config.origin(), req.path, req.query)?;
    let outbound_headers = headers::prepare_upstream_headers(
        req.headers,
        uri.authority(),
        config.relay.forward_headers,
        req.body.is_some(),
    );

    let upstream_response = upstream::send(
        upstream::UpstreamRequest {
            client: &state.http_client,
            method: req.method,
            uri,
            headers: outbound_headers,
            body: req.body,
            timeout: config.upstream.timeout,
        },
        req.request_id,
    )
    .await?;

    if !upstream_response.status.is_success() {
        return Err(RelayError::UpstreamStatus {
            status: upstream_response.status,
        });
    }

    let payload = Envelope::parse(&upstream_response.body)?.unwrap_payload()?;

    let mut resp_headers = upstream_response.headers;
    headers::sanitize_response_headers(&mut resp_headers);
    if !resp_headers.contains_key(CONTENT_TYPE) {
        resp_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    let body =
        serde_json::to_vec(&payload).map_err(|source| RelayError::PayloadEncode { source })?;
    let mut builder = Response::builder().status(StatusCode::OK);
    for (key, value) in &resp_headers {
        builder = builder.header(key, value);
    }
    Ok(builder
        .body(axum::body::Body::from(body))
        .unwrap_or_else(|e| {
            tracing::error!(
                request_id = %req.request_id,
                error = %e,
                "failed to build relay response"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }))
}

/// Leniently parse the inbound body, re-serializing it for the upstream.
///
/// Empty and malformed bodies are not errors: the request proceeds
/// without a body and only a diagnostic is logged.
fn parse_body(body: &Bytes, request_id: &str) -> Option<Bytes> {
    if body.is_empty() {
        tracing::debug!(request_id = %request_id, "empty request body");
        return None;
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_vec(&value).ok().map(Bytes::from),
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                error = %e,
                "failed to parse request body, forwarding without body"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_body_roundtrips_json() {
        let body = Bytes::from_static(br#"{"name": "test"}"#);
        let parsed = parse_body(&body, "rid").unwrap();
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&parsed).unwrap(),
            serde_json::json!({"name": "test"})
        );
    }

    #[test]
    fn parse_body_tolerates_empty() {
        assert_eq!(parse_body(&Bytes::new(), "rid"), None);
    }

    #[test]
    fn parse_body_tolerates_garbage() {
        let body = Bytes::from_static(b"{not json");
        assert_eq!(parse_body(&body, "rid"), None);
    }
}
