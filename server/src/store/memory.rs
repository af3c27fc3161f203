use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument};

use super::PasteStore;
use crate::error::StoreError;
use crate::lifecycle::Lookup;
use crate::paste::Paste;

/// Minimum gap, in paste time, between two sweeps of expired entries.
const SWEEP_INTERVAL_MS: i64 = 5 * 60 * 1000;

#[derive(Default)]
struct Pastes {
    by_id: HashMap<String, Paste>,
    last_sweep: i64,
}

/// Process-local store. Nothing survives a restart.
///
/// Pastes out of views are dropped on the read that finds them. Expired pastes
/// are only dropped when the store runs against the wall clock, since a
/// simulated clock may move backwards.
#[derive(Default)]
pub struct MemoryStore {
    pastes: Mutex<Pastes>,
    evict_expired: bool,
}

impl MemoryStore {
    /// A store that also forgets expired pastes, swept on insert at most once
    /// per [`SWEEP_INTERVAL_MS`] and on the read that finds them.
    pub fn evicting_expired() -> Self {
        Self {
            pastes: Mutex::default(),
            evict_expired: true,
        }
    }

    pub fn len(&self) -> usize {
        self.pastes.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PasteStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    #[instrument(skip_all, fields(id = %paste.id))]
    async fn insert_paste(&self, paste: Paste) -> Result<(), StoreError> {
        let now = paste.created_at;
        let paste = Paste { views: 0, ..paste };
        let mut pastes = self.pastes.lock();

        if self.evict_expired && now - pastes.last_sweep >= SWEEP_INTERVAL_MS {
            let before = pastes.by_id.len();
            pastes.by_id.retain(|_, paste| paste.is_available_at(now));
            pastes.last_sweep = now;
            debug!(removed = before - pastes.by_id.len(), "swept dead pastes");
        }

        pastes.by_id.insert(paste.id.clone(), paste);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_paste(&self, id: &str, now: i64) -> Result<Lookup, StoreError> {
        // Check and increment under a single lock acquisition.
        let mut pastes = self.pastes.lock();
        let Some(paste) = pastes.by_id.get_mut(id) else {
            return Ok(Lookup::Missing);
        };

        if !paste.is_available_at(now) {
            if paste.exhausted() || self.evict_expired {
                pastes.by_id.remove(id);
            }
            return Ok(Lookup::Withheld);
        }

        paste.views += 1;
        Ok(Lookup::Granted(paste.clone()))
    }

    async fn check_health(&self) -> bool {
        true
    }
}
