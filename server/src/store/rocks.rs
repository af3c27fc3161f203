//! Local durable store on RocksDB, one bincode-encoded [`Paste`] per
//! `paste:{id}` key.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{Direction, IteratorMode, WriteBatch, DB};
use tokio::task;
use tracing::{debug, error, instrument, warn};

use super::PasteStore;
use crate::error::StoreError;
use crate::lifecycle::Lookup;
use crate::paste::Paste;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const HEALTH_KEY: &[u8] = b"\0health";
const PASTE_PREFIX: &[u8] = b"paste:";

fn paste_key(id: &str) -> Vec<u8> {
    [PASTE_PREFIX, id.as_bytes()].concat()
}

pub struct RocksStore {
    db: Arc<DB>,
    // RocksDB has no compare-and-swap; reads that bump the counter take this.
    write_lock: Arc<Mutex<()>>,
    stop_signal: Arc<AtomicBool>,
}

impl RocksStore {
    /// Opens (or creates) the database at `path` and starts the periodic
    /// cleanup task. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if RocksDB cannot open the path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Arc::new(DB::open_default(path)?);
        let write_lock = Arc::new(Mutex::new(()));
        let stop_signal = Arc::new(AtomicBool::new(false));

        task::spawn(cleanup(
            Arc::clone(&stop_signal),
            Arc::downgrade(&db),
            Arc::clone(&write_lock),
        ));

        Ok(Self {
            db,
            write_lock,
            stop_signal,
        })
    }
}

impl Drop for RocksStore {
    fn drop(&mut self) {
        self.stop_signal.store(true, Ordering::Release);
    }
}

fn read_and_account(db: &DB, id: &str, now: i64) -> Result<Lookup, StoreError> {
    let key = paste_key(id);
    let Some(raw) = db.get(&key)? else {
        return Ok(Lookup::Missing);
    };

    let mut paste: Paste = bincode::deserialize(&raw)?;
    if !paste.is_available_at(now) {
        if paste.exhausted() {
            db.delete(&key)?;
        }
        return Ok(Lookup::Withheld);
    }

    paste.views += 1;
    db.put(&key, bincode::serialize(&paste)?)?;
    Ok(Lookup::Granted(paste))
}

#[async_trait]
impl PasteStore for RocksStore {
    fn name(&self) -> &'static str {
        "rocksdb"
    }

    #[instrument(skip_all, fields(id = %paste.id), err)]
    async fn insert_paste(&self, paste: Paste) -> Result<(), StoreError> {
        let value = bincode::serialize(&Paste { views: 0, ..paste.clone() })?;
        let db = Arc::clone(&self.db);
        let key = paste_key(&paste.id);
        task::spawn_blocking(move || db.put(key, value)).await??;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_paste(&self, id: &str, now: i64) -> Result<Lookup, StoreError> {
        let db = Arc::clone(&self.db);
        let write_lock = Arc::clone(&self.write_lock);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let _guard = write_lock.lock();
            read_and_account(&db, &id, now)
        })
        .await?
    }

    async fn check_health(&self) -> bool {
        let db = Arc::clone(&self.db);
        let probe = task::spawn_blocking(move || {
            db.put(HEALTH_KEY, b"ok")?;
            db.get(HEALTH_KEY)
        })
        .await;

        match probe {
            Ok(Ok(Some(value))) => value == b"ok",
            Ok(Ok(None)) => false,
            Ok(Err(e)) => {
                warn!("rocksdb health check failed: {}", e);
                false
            }
            Err(e) => {
                error!("Failed to join health check: {}", e);
                false
            }
        }
    }
}

/// Whether a stored value can never be shown again at `now`.
fn is_dead(value: &[u8], now: i64) -> bool {
    bincode::deserialize::<Paste>(value)
        .map(|paste| !paste.is_available_at(now))
        .unwrap_or_default()
}

/// Periodic clean-up task that deletes expired and exhausted entries. Holds
/// the database weakly so dropping the store closes it.
async fn cleanup(stop_signal: Arc<AtomicBool>, db: Weak<DB>, write_lock: Arc<Mutex<()>>) {
    while !stop_signal.load(Ordering::Acquire) {
        tokio::time::sleep(CLEANUP_INTERVAL).await;
        let Some(db) = db.upgrade() else {
            break;
        };
        if stop_signal.load(Ordering::Acquire) {
            break;
        }

        let write_lock = Arc::clone(&write_lock);
        let join_handle = task::spawn_blocking(move || {
            let now = tinypaste_common::time::now_millis();
            let _guard = write_lock.lock();
            let mut batch = WriteBatch::default();
            for (key, value) in db.iterator(IteratorMode::From(PASTE_PREFIX, Direction::Forward)) {
                if !key.starts_with(PASTE_PREFIX) {
                    break;
                }
                if is_dead(&value, now) {
                    batch.delete(key);
                }
            }
            let removed = batch.len();
            db.write(batch).map(|()| removed)
        })
        .await;

        match join_handle {
            Ok(Ok(removed)) => debug!(removed, "cleaned up dead pastes"),
            Ok(Err(e)) => warn!("Failed to cleanup db: {}", e),
            Err(e) => error!("Failed to join handle?! {}", e),
        }
    }
}
