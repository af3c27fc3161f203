//! Paste storage.
//!
//! Every backend offers the same contract: `get_paste` checks availability
//! and accounts the view as one atomic step, so concurrent readers can never
//! push a paste past its view quota.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, Storage};
use crate::error::StoreError;
use crate::lifecycle::Lookup;
use crate::paste::Paste;

pub mod kv;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocks;

pub use kv::KvStore;
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;

#[async_trait]
pub trait PasteStore: Send + Sync + 'static {
    /// Short backend name for logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Persists a new paste. Ids must be collision resistant; inserting over
    /// an existing id is unspecified.
    async fn insert_paste(&self, paste: Paste) -> Result<(), StoreError>;

    /// Grants a read of `id` at `now` if the paste is available, incrementing
    /// its view counter in the same step.
    async fn get_paste(&self, id: &str, now: i64) -> Result<Lookup, StoreError>;

    /// Liveness of the backend. Never errors; failures read as `false`.
    async fn check_health(&self) -> bool;
}

/// Builds the configured backend. `None` means stateless mode. Outside test
/// mode the memory backend also forgets expired pastes.
///
/// # Errors
///
/// Fails if the backend cannot be initialized, or if it requires a cargo
/// feature this build lacks.
pub fn connect(config: &Config) -> anyhow::Result<Option<Arc<dyn PasteStore>>> {
    let store: Arc<dyn PasteStore> = match &config.storage {
        Storage::Stateless => return Ok(None),
        Storage::Memory if config.test_mode => Arc::new(MemoryStore::default()),
        Storage::Memory => Arc::new(MemoryStore::evicting_expired()),
        Storage::Kv { url, token } => Arc::new(KvStore::new(url.clone(), token.clone())?),
        #[cfg(feature = "rocksdb")]
        Storage::Rocks { path } => Arc::new(RocksStore::open(path)?),
        #[cfg(not(feature = "rocksdb"))]
        Storage::Rocks { .. } => {
            anyhow::bail!("rocksdb storage requested but this build lacks the `rocksdb` feature")
        }
    };
    Ok(Some(store))
}
