//! The single outbound exchange with the upstream.
//!
//! [`target_uri`] joins origin, path, and query by plain concatenation,
//! and [`send`] performs one request through the pooled client, applying
//! the optional timeout and collecting the response body to bytes.

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{StatusCode, Uri};

use crate::error::RelayError;
use crate::server::HttpClient;

/// Fully collected upstream response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct UpstreamRequest<'a> {
    pub client: &'a HttpClient,
    pub method: &'a Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<u64>,
}

/// Join origin, path, and query into the outbound URI.
///
/// The origin has its trailing slash trimmed at the config layer, the
/// path always starts with `/`, and the query string is appended
/// verbatim when present.
pub fn target_uri(origin: &str, path: &str, query: Option<&str>) -> Result<Uri, RelayError> {
    let mut target = String::with_capacity(origin.len() + path.len());
    target.push_str(origin);
    target.push_str(path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }
    target
        .parse::<Uri>()
        .map_err(|source| RelayError::Uri { source })
}

#[allow(clippy::cast_possible_truncation)]
pub async fn send(
    req: UpstreamRequest<'_>,
    request_id: &str,
) -> Result<UpstreamResponse, RelayError> {
    let start = Instant::now();
    let target = req.uri.to_string();

    let mut builder = hyper::Request::builder()
        .method(req.method.clone())
        .uri(req.uri);
    for (key, value) in &req.headers {
        builder = builder.header(key, value);
    }
    let outbound = builder
        .body(Full::new(req.body.unwrap_or_default()))
        .map_err(|source| RelayError::RequestBuild { source })?;

    let exchange = req.client.request(outbound);
    let response = match req.timeout {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), exchange)
            .await
            .map_err(|_| RelayError::Timeout(ms))?,
        None => exchange.await,
    }
    .map_err(|source| RelayError::Transport { source })?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|source| RelayError::Body { source })?
        .to_bytes();

    tracing::info!(
        request_id = %request_id,
        target = %target,
        status = status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        bytes = body.len(),
        "upstream responded"
    );

    Ok(UpstreamResponse {
        status,
        headers,
        body,
    })
}
