//! Device-local key-value storage.
//!
//! Holds the fastest cache tier and all guest-mode state. Keys:
//!
//! - `horoscope_{sign}_{date}` / `feature_{feature}_{date}` - cached payloads
//! - `astro_dozi_guest` - set while the user is in guest mode
//! - `astro_dozi_data` - guest state, `{"coins": 50, "selectedSign": "leo"}`

mod file;
mod memory;

use astro_dozi_core::{CacheKey, DateKey};
use thiserror::Error;
use tracing::{debug, warn};

pub use file::FileLocalStore;
pub use memory::MemoryLocalStore;

/// Guest mode flag key.
pub const GUEST_FLAG_KEY: &str = "astro_dozi_guest";
/// Guest state key.
pub const GUEST_DATA_KEY: &str = "astro_dozi_data";

/// Errors returned by a [`LocalStore`].
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persistent string key-value store, scoped to this device.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    /// # Errors
    ///
    /// Returns an error if the removal cannot be persisted.
    fn remove(&self, key: &str) -> Result<(), LocalStoreError>;

    fn keys(&self) -> Vec<String>;
}

/// Remove every cached horoscope and feature payload.
///
/// Returns the number of entries removed.
pub fn clear_cached_payloads(store: &dyn LocalStore) -> usize {
    remove_cache_entries(store, |_| true)
}

/// Remove cached payloads dated before `today`.
///
/// Returns the number of entries removed.
pub fn prune_stale_entries(store: &dyn LocalStore, today: DateKey) -> usize {
    remove_cache_entries(store, |key| key.date() < today)
}

fn remove_cache_entries(store: &dyn LocalStore, select: impl Fn(&CacheKey) -> bool) -> usize {
    let mut removed = 0;
    for key in store.keys() {
        let Some(cache_key) = CacheKey::from_local_key(&key) else {
            continue;
        };
        if !select(&cache_key) {
            continue;
        }
        match store.remove(&key) {
            Ok(()) => removed += 1,
            Err(e) => warn!(key = %key, error = %e, "failed to remove cached payload"),
        }
    }
    if removed > 0 {
        debug!(removed, "removed cached payloads");
    }
    removed
}
