//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as a malformed upstream origin, a bad relay prefix, or
//! methods the relay cannot serve. Returns a list of
//! [`ValidationError`] values with per-field suggestions.

use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Methods the relay can serve. The envelope contract requires a JSON
/// response body, so bodyless response methods (HEAD, OPTIONS) are out.
pub const VALID_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Validate an upstream origin URL. Returns `Ok(())` or a human-readable error.
pub fn validate_origin(origin: &str) -> Result<(), String> {
    let parsed =
        Url::parse(origin).map_err(|_| format!("'{origin}' is not a valid URL"))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(format!(
            "unsupported scheme '{scheme}' (expected http or https)"
        ));
    }
    if parsed.host_str().is_none() {
        return Err("origin must include a host".into());
    }
    if parsed.query().is_some() {
        return Err("origin must not carry a query string".into());
    }
    if parsed.fragment().is_some() {
        return Err("origin must not carry a fragment".into());
    }
    Ok(())
}

/// Validate a relay prefix. Returns `Ok(())` or a human-readable error.
pub fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() {
        return Err("prefix cannot be empty".into());
    }
    if !prefix.starts_with('/') {
        return Err(format!("prefix must start with '/' (got '{prefix}')"));
    }
    if prefix.len() > 1 && prefix.ends_with('/') {
        return Err("prefix must not end with '/'".into());
    }
    Ok(())
}

/// Validate an HTTP method string. Returns `Ok(())` or a human-readable error.
pub fn validate_method(method: &str) -> Result<(), String> {
    let upper = method.to_uppercase();
    if VALID_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(format!(
            "'{method}' cannot be relayed (supported: {})",
            VALID_METHODS.join(", ")
        ))
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(msg) = validate_origin(&config.upstream.origin) {
        let origin = &config.upstream.origin;
        errors.push(ValidationError {
            field: "upstream.origin".into(),
            message: msg,
            suggestion: if !origin.is_empty() && !origin.contains("://") {
                Some(format!("did you mean 'http://{origin}'?"))
            } else {
                None
            },
        });
    }

    if config.upstream.timeout == Some(0) {
        errors.push(ValidationError {
            field: "upstream.timeout".into(),
            message: "timeout must be greater than 0 (omit it to wait forever)".into(),
            suggestion: None,
        });
    }

    if let Err(msg) = validate_prefix(&config.relay.prefix) {
        let prefix = &config.relay.prefix;
        errors.push(ValidationError {
            field: "relay.prefix".into(),
            message: msg,
            suggestion: if !prefix.is_empty() && !prefix.starts_with('/') {
                Some(format!("did you mean '/{prefix}'?"))
            } else {
                None
            },
        });
    }

    if config.relay.methods.is_empty() {
        errors.push(ValidationError {
            field: "relay.methods".into(),
            message: "at least one method must be allowed".into(),
            suggestion: None,
        });
    }

    let mut seen = std::collections::HashSet::new();
    for method in &config.relay.methods {
        if let Err(msg) = validate_method(method) {
            errors.push(ValidationError {
                field: "relay.methods".into(),
                message: msg,
                suggestion: None,
            });
        }
        if !seen.insert(method.to_uppercase()) {
            errors.push(ValidationError {
                field: "relay.methods".into(),
                message: format!("duplicate method '{method}'"),
                suggestion: None,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let timeout = config.upstream.timeout.map_or_else(
        || "none (waits forever)".to_string(),
        |t| format!("{t}ms"),
    );
    let path_mode = if config.relay.strip_prefix {
        "stripped before forwarding"
    } else {
        "forwarded verbatim"
    };

    format!(
        "{} is valid\n  \
         upstream: {} (timeout: {})\n  \
         prefix:   {} ({})\n  \
         methods:  {}",
        path,
        config.origin(),
        timeout,
        config.relay.prefix,
        path_mode,
        config.relay.methods.join(", "),
    )
}
