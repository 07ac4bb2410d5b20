//! Environment-driven config source.
//!
//! Builds a whole [`Config`] without a config file, for deployments that
//! inject the upstream per environment. The origin itself arrives through
//! the CLI layer (`--upstream` / `UPSTREAM_ORIGIN`); the remaining knobs
//! are read from the environment here. Everything goes through the same
//! validation pipeline as file-based configs.

use async_trait::async_trait;

use super::validate_and_hash;
use crate::config::model::{Config, RelaySettings, Upstream};
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::BellhopError;

/// Per-request timeout in milliseconds. Optional.
pub const TIMEOUT_VAR: &str = "UPSTREAM_TIMEOUT_MS";
/// Path prefix the relay answers under. Optional.
pub const PREFIX_VAR: &str = "RELAY_PREFIX";
/// Comma-separated allowed methods. Optional.
pub const METHODS_VAR: &str = "RELAY_METHODS";
/// Whether client headers are forwarded upstream. Optional boolean.
pub const FORWARD_HEADERS_VAR: &str = "RELAY_FORWARD_HEADERS";
/// Whether the prefix is removed from the upstream path. Optional boolean.
pub const STRIP_PREFIX_VAR: &str = "RELAY_STRIP_PREFIX";

/// Config source for file-less deployments.
pub struct EnvSource {
    origin: String,
}

impl EnvSource {
    #[must_use]
    pub fn new(origin: String) -> Self {
        Self { origin }
    }

    fn build(&self) -> Result<Config, BellhopError> {
        Self::build_from(self.origin.clone(), read_var)
    }

    fn build_from(
        origin: String,
        get: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Config, BellhopError> {
        let timeout = match get(TIMEOUT_VAR) {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| BellhopError::EnvVar {
                name: TIMEOUT_VAR,
                reason: format!("'{raw}' is not a number of milliseconds"),
            })?),
            None => None,
        };

        let mut relay = RelaySettings::default();
        if let Some(prefix) = get(PREFIX_VAR) {
            relay.prefix = prefix;
        }
        if let Some(raw) = get(METHODS_VAR) {
            relay.methods = raw
                .split(',')
                .map(|m| m.trim().to_uppercase())
                .filter(|m| !m.is_empty())
                .collect();
        }
        if let Some(raw) = get(FORWARD_HEADERS_VAR) {
            relay.forward_headers = parse_bool(FORWARD_HEADERS_VAR, &raw)?;
        }
        if let Some(raw) = get(STRIP_PREFIX_VAR) {
            relay.strip_prefix = parse_bool(STRIP_PREFIX_VAR, &raw)?;
        }

        Ok(Config {
            upstream: Upstream { origin, timeout },
            relay,
        })
    }
}

fn read_var(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, BellhopError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(BellhopError::EnvVar {
            name,
            reason: format!("'{raw}' is not a boolean"),
        }),
    }
}

#[async_trait]
impl ConfigSource for EnvSource {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), BellhopError> {
        let config = self.build()?;
        // Hash the rendered model so identical environments agree on a version.
        let canonical = serde_json::to_string(&config).map_err(|e| BellhopError::ConfigParse {
            path: "env".to_string(),
            source: Box::new(e),
        })?;
        validate_and_hash(config, &canonical)
    }

    async fn has_changed(&self, _current: &ConfigVersion) -> Result<bool, BellhopError> {
        // The environment of a running process does not change underneath it.
        Ok(false)
    }
}
