//! Decides whether a paste may be shown.
//!
//! View accounting happens inside the store, atomically with its own
//! availability check. This module only interprets what the store returned,
//! falling back to the stateless encoding when the store has never heard of
//! the identifier.

use tinypaste_common::StatelessPaste;
use tracing::{debug, trace};

use crate::paste::Paste;

/// Outcome of a single `get_paste` call against a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// The read was granted and `views` already includes it.
    Granted(Paste),
    /// The record exists but is expired or out of views.
    Withheld,
    /// Nothing is stored under the identifier.
    Missing,
}

/// The three ways a paste's view counter is shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewCount {
    /// Stateless pastes carry no counter.
    Untracked,
    Limited { views: u64, max: u64 },
    Unlimited(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasteView {
    pub content: String,
    pub expires_at: Option<i64>,
    /// `None` for stateless pastes.
    pub views: Option<u64>,
    pub max_views: Option<u64>,
}

impl PasteView {
    pub fn remaining_views(&self) -> Option<u64> {
        self.max_views
            .map(|max| max.saturating_sub(self.views.unwrap_or_default()))
    }

    pub fn view_count(&self) -> ViewCount {
        match (self.views, self.max_views) {
            (None, _) => ViewCount::Untracked,
            (Some(views), Some(max)) => ViewCount::Limited { views, max },
            (Some(views), None) => ViewCount::Unlimited(views),
        }
    }
}

impl From<Paste> for PasteView {
    fn from(paste: Paste) -> Self {
        Self {
            content: paste.content,
            expires_at: paste.expires_at,
            views: Some(paste.views),
            max_views: paste.max_views,
        }
    }
}

impl From<StatelessPaste> for PasteView {
    fn from(paste: StatelessPaste) -> Self {
        Self {
            content: paste.content,
            expires_at: paste.expires_at,
            views: None,
            max_views: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Available(PasteView),
    /// Never existed, expired, out of views, or undecodable. Callers cannot
    /// tell which.
    Unavailable,
}

/// Applies the availability rules to a store lookup for `id` at `now`.
///
/// A stored record, available or not, always wins: an identifier the store
/// knows about is never reinterpreted as a stateless payload.
pub fn evaluate(lookup: Lookup, id: &str, now: i64) -> Resolution {
    match lookup {
        Lookup::Granted(paste) => evaluate_stored(paste, now),
        Lookup::Withheld => Resolution::Unavailable,
        Lookup::Missing => evaluate_stateless(id, now),
    }
}

fn evaluate_stored(paste: Paste, now: i64) -> Resolution {
    // `views` counts this read, so it may equal but never exceed the quota.
    let over_quota = paste.max_views.is_some_and(|max| paste.views > max);
    if paste.expired_at(now) || over_quota {
        debug!(id = %paste.id, views = paste.views, "store granted a read past the paste's limits");
        return Resolution::Unavailable;
    }

    Resolution::Available(paste.into())
}

fn evaluate_stateless(id: &str, now: i64) -> Resolution {
    match StatelessPaste::decode(id) {
        Ok(paste) if paste.is_available_at(now) => Resolution::Available(paste.into()),
        Ok(_) => Resolution::Unavailable,
        Err(e) => {
            trace!("identifier is not a stateless paste: {}", e);
            Resolution::Unavailable
        }
    }
}
