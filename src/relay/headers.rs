//! Outbound header preparation and response header sanitizing.
//!
//! [`prepare_upstream_headers`] clones the original client headers (when
//! forwarding is enabled), strips hop-by-hop headers, rewrites `Host` to
//! the upstream authority, and defaults the `Content-Type` when a JSON
//! body is attached. Cookies and other application headers pass through
//! untouched so session state reaches the upstream.

use std::sync::LazyLock;

use axum::http::uri::Authority;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use hyper::header::{ACCEPT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Build the header set for the upstream request.
///
/// `content-length` is dropped because the body is re-serialized, and
/// `accept-encoding` because the relay has to read the envelope and does
/// not decode compressed bodies.
pub fn prepare_upstream_headers(
    original: &HeaderMap,
    authority: Option<&Authority>,
    forward_headers: bool,
    has_body: bool,
) -> HeaderMap {
    let mut headers = if forward_headers {
        original.clone()
    } else {
        HeaderMap::new()
    };

    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(CONTENT_LENGTH);
    headers.remove(ACCEPT_ENCODING);

    // Rewrite Host to the upstream authority
    if let Some(authority) = authority {
        if let Ok(val) = HeaderValue::from_str(authority.as_str()) {
            headers.insert("host", val);
        }
    }

    if has_body && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    headers
}

/// Strip hop-by-hop headers and `content-length` from an upstream
/// response before propagating it.
///
/// The body has already been fully collected and re-serialized, so
/// `transfer-encoding` and `content-length` from the upstream are no
/// longer accurate. Axum sets the correct `content-length` based on the
/// actual body bytes.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(CONTENT_LENGTH);
}
