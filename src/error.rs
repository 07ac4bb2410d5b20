//! Unified error types for Bellhop.
//!
//! Defines [`BellhopError`] (startup, config, and CLI failures),
//! [`ValidationError`] for config validation findings, and [`RelayError`]
//! for per-request relay failures. All use `thiserror` for `Display` and
//! `Error` derives. [`RelayError`] additionally knows how to render itself
//! as the caller-facing JSON error response.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BellhopError {
    #[error("No config source found.\n\n  {hint}")]
    NoConfigSource { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid environment variable {name}: {reason}")]
    EnvVar { name: &'static str, reason: String },

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}

/// A failure while relaying one request to the upstream.
///
/// Each variant has a fixed HTTP mapping, applied by the
/// [`IntoResponse`] impl:
///
/// | Variant | Status | Body |
/// |---------|--------|------|
/// | [`UpstreamStatus`](Self::UpstreamStatus) | the upstream's own | `{"error": "Upstream request failed"}` |
/// | [`Rejected`](Self::Rejected) | 400 | `{"error": <message or "Unknown error">}` |
/// | everything else | 500 | `{"error": "Internal server error", "message": <text>}` |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RelayError {
    /// The upstream answered with a non-2xx status. Its status code is
    /// passed through; its body and headers are not.
    #[error("upstream returned status {status}")]
    UpstreamStatus { status: StatusCode },

    /// The upstream answered 2xx but the envelope `status` was not `"OK"`.
    #[error("upstream rejected the request: {}", .message.as_deref().unwrap_or("Unknown error"))]
    Rejected { message: Option<String> },

    /// The upstream's 2xx body did not deserialize as a response envelope.
    #[error("invalid response envelope: {source}")]
    InvalidEnvelope {
        #[source]
        source: serde_json::Error,
    },

    /// The unwrapped payload could not be re-serialized for the caller.
    #[error("failed to encode response payload: {source}")]
    PayloadEncode {
        #[source]
        source: serde_json::Error,
    },

    #[error("upstream connection error: {source}")]
    Transport {
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("failed to read upstream response body: {source}")]
    Body {
        #[source]
        source: hyper::Error,
    },

    #[error("invalid upstream target: {source}")]
    Uri {
        #[source]
        source: http::uri::InvalidUri,
    },

    #[error("failed to build upstream request: {source}")]
    RequestBuild {
        #[source]
        source: http::Error,
    },

    #[error("upstream request timed out after {0}ms")]
    Timeout(u64),
}

impl RelayError {
    /// The HTTP status the caller will see for this failure.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UpstreamStatus { status } => *status,
            Self::Rejected { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Caller-facing error body. Always carries `error`; `message` only on
/// unexpected failures.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::UpstreamStatus { .. } => ErrorBody {
                error: "Upstream request failed".into(),
                message: None,
            },
            Self::Rejected { message } => ErrorBody {
                error: message.unwrap_or_else(|| "Unknown error".into()),
                message: None,
            },
            other => ErrorBody {
                error: "Internal server error".into(),
                message: Some(other.to_string()),
            },
        };
        (status, Json(body)).into_response()
    }
}
