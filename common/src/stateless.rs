//! Stateless pastes: the whole paste lives in its identifier.
//!
//! The identifier is the URL-safe base64 encoding of a JSON object
//! `{"content": ..., "expires_at": ...}`. No view tracking is possible, so a
//! stateless paste only ever carries its content and an optional expiry.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::base64;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StatelessPaste {
    pub content: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("identifier is not valid url-safe base64")]
    Encoding(#[from] base64::DecodeError),
    #[error("identifier does not hold a paste payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl StatelessPaste {
    pub fn new(content: impl Into<String>, expires_at: Option<i64>) -> Self {
        Self {
            content: content.into(),
            expires_at,
        }
    }

    /// Serializes then encodes the paste into an identifier. The output is
    /// deterministic and grows with the content.
    #[must_use]
    pub fn encode(&self) -> String {
        let payload = json!({
            "content": self.content,
            "expires_at": self.expires_at,
        });
        base64::encode(payload.to_string())
    }

    /// Reverses [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Fails when `id` is not base64, does not decode to a JSON object, lacks a
    /// string `content` field, or carries a non-integer `expires_at`.
    pub fn decode(id: &str) -> Result<Self, DecodeError> {
        let raw = base64::decode(id)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    #[must_use]
    pub fn is_available_at(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}
