//! Upstream response envelope contract.
//!
//! The upstream wraps every JSON response as
//! `{ "status": "...", "payload": ..., "errors": { "message": "..." } }`.
//! [`Envelope::parse`] deserializes the body into a typed struct so shape
//! violations fail fast as [`RelayError::InvalidEnvelope`], and
//! [`Envelope::unwrap_payload`] turns the envelope into either the payload
//! value or a rejection carrying the upstream's own error message.

use serde::Deserialize;
use serde_json::Value;

use crate::error::RelayError;

/// The one `status` value that means success.
pub const STATUS_OK: &str = "OK";

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub status: String,

    /// Returned verbatim to the caller on success. Absent means `null`.
    #[serde(default)]
    pub payload: Value,

    #[serde(default)]
    pub errors: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}

impl Envelope {
    /// Deserialize an upstream body. Extra fields are tolerated; a body
    /// that is not a JSON object with a string `status` is an
    /// [`RelayError::InvalidEnvelope`].
    pub fn parse(body: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(body).map_err(|source| RelayError::InvalidEnvelope { source })
    }

    /// Whether the upstream reported success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Consume the envelope: the payload on success, otherwise a
    /// [`RelayError::Rejected`] carrying `errors.message` when present.
    pub fn unwrap_payload(self) -> Result<Value, RelayError> {
        if self.is_ok() {
            Ok(self.payload)
        } else {
            Err(RelayError::Rejected {
                message: self.errors.and_then(|e| e.message),
            })
        }
    }
}
