//! Serde data structures for the Bellhop configuration file.
//!
//! Contains [`Config`] (the root), [`Upstream`] (where requests go), and
//! [`RelaySettings`] (how they get there). All types derive `Serialize`
//! and `Deserialize` with `deny_unknown_fields` for strict parsing.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PREFIX: &str = "/api";

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

const fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_default_prefix(v: &str) -> bool {
    v == DEFAULT_PREFIX
}

fn is_default_methods(v: &[String]) -> bool {
    v == default_methods()
}

fn is_default_relay(v: &RelaySettings) -> bool {
    is_default_prefix(&v.prefix)
        && is_default_methods(&v.methods)
        && v.forward_headers
        && !v.strip_prefix
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub upstream: Upstream,

    #[serde(default, skip_serializing_if = "is_default_relay")]
    pub relay: RelaySettings,
}

impl Config {
    /// Upstream origin with trailing slashes removed, ready for path
    /// concatenation.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.upstream.origin.trim_end_matches('/')
    }
}

/// The single backend every relayed request is sent to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Upstream {
    /// Base URL, e.g. `http://localhost:8080`. Scheme and host are
    /// required; a path prefix is allowed, query and fragment are not.
    pub origin: String,

    /// Per-request timeout in milliseconds. Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySettings {
    /// Path prefix the relay answers under. `/` relays every path.
    #[serde(default = "default_prefix", skip_serializing_if = "is_default_prefix")]
    pub prefix: String,

    /// Allowed inbound methods. Anything else under the prefix gets 405.
    #[serde(default = "default_methods", skip_serializing_if = "is_default_methods")]
    pub methods: Vec<String>,

    /// Forward the inbound header set to the upstream.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub forward_headers: bool,

    /// Remove the prefix from the outbound path. Off by default: the
    /// upstream sees the same path the caller sent.
    #[serde(default, skip_serializing_if = "is_false")]
    pub strip_prefix: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            methods: default_methods(),
            forward_headers: default_true(),
            strip_prefix: false,
        }
    }
}
