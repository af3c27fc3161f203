use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A stored paste. Everything except `views` is fixed at creation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Paste {
    pub id: String,
    pub content: String,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub max_views: Option<u64>,
    /// Granted reads so far.
    pub views: u64,
}

impl Paste {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        created_at: i64,
        expires_at: Option<i64>,
        max_views: Option<u64>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            created_at,
            expires_at,
            max_views,
            views: 0,
        }
    }

    pub fn expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn exhausted(&self) -> bool {
        self.max_views.is_some_and(|max| self.views >= max)
    }

    /// Whether one more read may be granted at `now`.
    pub fn is_available_at(&self, now: i64) -> bool {
        !self.expired_at(now) && !self.exhausted()
    }

    /// How long a backend with native expiry should keep the record: the
    /// lifetime rounded up to whole seconds, at least one.
    pub fn ttl(&self) -> Option<Duration> {
        self.expires_at.map(|expires_at| {
            let lifetime = u64::try_from(expires_at - self.created_at).unwrap_or_default();
            Duration::from_secs(lifetime.div_ceil(1000).max(1))
        })
    }
}
