//! The key/value store tables read and write their view state through.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::{
    FileStorage, MemoryStorage, NullStorage, StorageBackend, StorageError, StorageResult,
    StoredEntry,
};
use crate::stateful::Stateful;

/// Write-through cache in front of a [`StorageBackend`].
///
/// `get` and `set` never fail: a missing entry, a parse failure or an
/// unavailable backend yields the caller's fallback, and write failures are
/// logged and swallowed. The fallible primitives (`load`, `clear`) are still
/// exposed for hosts that want to report storage health.
///
/// The store is `Send + Sync`; one instance is normally shared by every table
/// mounted in a host.
pub struct StateStore {
    backend: Box<dyn StorageBackend>,
    cache: RwLock<Cache>,
}

/// `persisted` mirrors what the backend accepted and is the only set handed
/// to `save_all`. `session` holds values the backend rejected; they shadow
/// `persisted` for reads and are dropped on `load`.
#[derive(Default)]
struct Cache {
    persisted: HashMap<String, StoredEntry>,
    session: HashMap<String, StoredEntry>,
}

impl Cache {
    fn get(&self, key: &str) -> Option<&StoredEntry> {
        self.session.get(key).or_else(|| self.persisted.get(key))
    }

    fn keys(&self) -> impl Iterator<Item = &String> {
        self.persisted
            .keys()
            .chain(self.session.keys().filter(|k| !self.persisted.contains_key(*k)))
    }
}

fn lock_poisoned<T>(_: T) -> StorageError {
    StorageError::Corruption("cache lock poisoned".into())
}

impl StateStore {
    /// Create a store over `backend` and load whatever it already holds.
    ///
    /// A failing load is logged and the store starts empty.
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        let store = Self {
            backend,
            cache: RwLock::new(Cache::default()),
        };
        if let Err(err) = store.load() {
            tracing::warn!(
                backend = %store.backend.name(),
                error = %err,
                "failed to load persisted view state, starting empty"
            );
        }
        store
    }

    /// Store backed by [`MemoryStorage`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// Store backed by a JSON file at `path`.
    #[must_use]
    pub fn with_file(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(Box::new(FileStorage::new(path)))
    }

    /// Store with no persistence at all; every read yields the fallback.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(Box::new(NullStorage))
    }

    /// Replace the cache with the backend's contents. Values only this
    /// session could see are discarded.
    pub fn load(&self) -> StorageResult<usize> {
        let entries = self.backend.load_all()?;
        let count = entries.len();
        let mut cache = self.cache.write().map_err(lock_poisoned)?;
        cache.persisted = entries;
        cache.session.clear();
        tracing::debug!(backend = %self.backend.name(), count, "loaded view state");
        Ok(count)
    }

    /// Read and deserialize the value under `key`.
    ///
    /// Returns `fallback` unchanged when the key is missing, the stored text
    /// does not parse as `T`, or the backend is unavailable.
    pub fn get<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let Some(text) = self.raw(key) else {
            return fallback;
        };
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "cannot parse stored value, using fallback");
                fallback
            }
        }
    }

    /// Serialized text stored under `key`, if any.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        let cache = self.cache.read().ok()?;
        cache.get(key).map(|e| e.data.clone())
    }

    /// Serialize `value` and write it under `key`.
    ///
    /// A value the backend rejects stays visible to this session only. It is
    /// never resent with later writes, so other keys keep persisting.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(key, error = %err, "cannot serialize value, skipping write");
                return;
            }
        };
        self.set_raw(key, text);
    }

    /// Write already-serialized text under `key`.
    pub fn set_raw(&self, key: &str, text: String) {
        let Ok(mut cache) = self.cache.write() else {
            tracing::warn!(key, "cache lock poisoned, dropping write");
            return;
        };
        let entry = StoredEntry::new(key, text);
        let previous = cache.persisted.insert(key.to_string(), entry.clone());
        match self.backend.save_all(&cache.persisted) {
            Ok(()) => {
                cache.session.remove(key);
                tracing::debug!(key, backend = %self.backend.name(), "stored value");
            }
            Err(err) => {
                match previous {
                    Some(previous) => cache.persisted.insert(key.to_string(), previous),
                    None => cache.persisted.remove(key),
                };
                cache.session.insert(key.to_string(), entry);
                tracing::warn!(
                    key,
                    backend = %self.backend.name(),
                    error = %err,
                    "failed to persist value, keeping it for this session"
                );
            }
        }
    }

    /// Remove the value under `key`. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        let Ok(mut cache) = self.cache.write() else {
            return false;
        };
        let in_session = cache.session.remove(key).is_some();
        if cache.persisted.remove(key).is_none() {
            return in_session;
        }
        if let Err(err) = self.backend.save_all(&cache.persisted) {
            tracing::warn!(key, error = %err, "failed to persist removal");
        }
        true
    }

    /// Clear all state from both cache and backend.
    pub fn clear(&self) -> StorageResult<()> {
        self.backend.clear()?;
        if let Ok(mut cache) = self.cache.write() {
            cache.persisted.clear();
            cache.session.clear();
        }
        Ok(())
    }

    /// Restore `target` from the value under its state key.
    ///
    /// Returns `false` (leaving `target` untouched) when nothing usable is
    /// stored.
    pub fn restore<W: Stateful>(&self, target: &mut W) -> bool {
        let key = target.state_key().canonical();
        match self.get::<Option<W::State>>(&key, None) {
            Some(state) => {
                target.restore_state(state);
                true
            }
            None => false,
        }
    }

    /// Persist `source`'s current state under its state key.
    pub fn save<W: Stateful>(&self, source: &W) {
        let key = source.state_key().canonical();
        self.set(&key, &source.save_state());
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.keys().count()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All cached keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.cache
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Backend name for logging.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether the backend can currently persist anything.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Wrap in `Arc` for sharing between tables.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("backend", &self.backend.name())
            .field("entries", &self.len())
            .finish()
    }
}
