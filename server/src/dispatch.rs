//! Creation and retrieval of pastes, independent of the transport.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tinypaste_common::{time, StatelessPaste};
use tracing::{debug, instrument};

use crate::error::{StoreError, ValidationError};
use crate::lifecycle::{self, Resolution};
use crate::paste::Paste;
use crate::short_code::{self, ShortCode, SHORT_CODE_SIZE};
use crate::store::PasteStore;

/// Largest integer a JSON number is guaranteed to hold exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A validated create request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPaste {
    pub content: String,
    pub expires_at: Option<i64>,
    pub max_views: Option<u64>,
}

/// Accepts JSON integers >= 1, including integral floats such as `5.0`.
fn positive_integer(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && (1.0..=MAX_SAFE_INTEGER).contains(f))
                .map(|f| f as u64)
        })
        .filter(|n| *n >= 1)
}

/// Absent and `null` are both "not given".
fn optional_field<'a>(body: &'a Value, field: &str) -> Option<&'a Value> {
    body.get(field).filter(|value| !value.is_null())
}

impl NewPaste {
    /// Validates a raw create request received at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first offending field: `content` if it is missing, not a
    /// string, or blank; `ttl_seconds` or `max_views` if present but not a
    /// positive integer.
    pub fn parse(body: &Value, now: i64) -> Result<Self, ValidationError> {
        let content = body
            .get("content")
            .and_then(Value::as_str)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ValidationError::new(
                "content",
                "Content is required and must be a non-empty string.",
            ))?;

        let expires_at = optional_field(body, "ttl_seconds")
            .map(|ttl| {
                positive_integer(ttl)
                    .and_then(|ttl| i64::try_from(ttl).ok())
                    .and_then(|ttl| ttl.checked_mul(1000))
                    .and_then(|ttl| now.checked_add(ttl))
                    // Must stay representable as a calendar date.
                    .filter(|expires_at| time::to_datetime(*expires_at).is_some())
                    .ok_or(ValidationError::new(
                        "ttl_seconds",
                        "ttl_seconds must be a positive integer.",
                    ))
            })
            .transpose()?;

        let max_views = optional_field(body, "max_views")
            .map(|max_views| {
                positive_integer(max_views).ok_or(ValidationError::new(
                    "max_views",
                    "max_views must be a positive integer.",
                ))
            })
            .transpose()?;

        Ok(Self {
            content: content.to_string(),
            expires_at,
            max_views,
        })
    }
}

/// Routes creation and retrieval to the configured store, or to stateless
/// identifiers when there is none.
pub struct Dispatcher {
    store: Option<Arc<dyn PasteStore>>,
    rng: Mutex<StdRng>,
}

impl Dispatcher {
    pub fn new(store: Option<Arc<dyn PasteStore>>) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Backend name, or `stateless`.
    pub fn mode(&self) -> &'static str {
        self.store.as_ref().map_or("stateless", |store| store.name())
    }

    fn generate_id(&self) -> String {
        let code: ShortCode<SHORT_CODE_SIZE> = self.rng.lock().sample(short_code::Generator);
        code.to_string()
    }

    /// Stores the paste and returns its id. Without a store the id is the
    /// stateless encoding and `max_views` cannot be enforced.
    #[instrument(skip_all, fields(mode = self.mode()))]
    pub async fn create(&self, paste: NewPaste, now: i64) -> Result<String, StoreError> {
        let Some(store) = &self.store else {
            if paste.max_views.is_some() {
                debug!("max_views is not enforceable for stateless pastes");
            }
            return Ok(StatelessPaste::new(paste.content, paste.expires_at).encode());
        };

        let id = self.generate_id();
        store
            .insert_paste(Paste::new(
                id.clone(),
                paste.content,
                now,
                paste.expires_at,
                paste.max_views,
            ))
            .await?;
        debug!(%id, "stored paste");
        Ok(id)
    }

    /// Looks `id` up at `now`, accounting a view if it is granted. "Not found"
    /// is [`Resolution::Unavailable`], never an error.
    #[instrument(skip(self))]
    pub async fn resolve(&self, id: &str, now: i64) -> Result<Resolution, StoreError> {
        let lookup = match &self.store {
            Some(store) => store.get_paste(id, now).await?,
            None => lifecycle::Lookup::Missing,
        };
        Ok(lifecycle::evaluate(lookup, id, now))
    }

    pub async fn check_health(&self) -> bool {
        match &self.store {
            Some(store) => store.check_health().await,
            None => true,
        }
    }
}
