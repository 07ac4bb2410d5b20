//! Prefix and method gating for inbound requests.
//!
//! The relay answers under a single configured path prefix. Requests
//! outside it get 404; requests under it with a method outside the
//! configured allow list get 405. Matching is segment-aware so a
//! `/api` prefix does not capture `/apiary`.

use crate::config::model::RelaySettings;

/// Match a request path against the relay prefix.
///
/// Returns the path to send upstream: the full inbound path by default,
/// or the remainder after the prefix when `strip_prefix` is set. `None`
/// means the path is outside the prefix.
pub fn match_prefix<'a>(settings: &RelaySettings, path: &'a str) -> Option<&'a str> {
    let prefix = settings.prefix.as_str();

    if prefix == "/" {
        return Some(path);
    }

    let rest = path.strip_prefix(prefix)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    if settings.strip_prefix {
        Some(if rest.is_empty() { "/" } else { rest })
    } else {
        Some(path)
    }
}

/// Whether `method` is in the configured allow list.
pub fn method_allowed(settings: &RelaySettings, method: &str) -> bool {
    settings
        .methods
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method))
}

/// `Allow` header value for 405 responses.
#[must_use]
pub fn allow_header(settings: &RelaySettings) -> String {
    settings.methods.join(", ")
}

/// Whether a request with this method may carry a body upstream.
/// GET requests never forward one.
#[must_use]
pub fn accepts_body(method: &str) -> bool {
    matches!(method, "POST" | "PUT" | "DELETE" | "PATCH")
}
