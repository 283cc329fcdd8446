//! Backend selection from the environment.
//!
//! # Env Var Contract
//!
//! - `TABULA_STATE_BACKEND` - `file` (default), `memory` or `none`
//! - `TABULA_STATE_FILE` - path of the state file for the `file` backend
//!
//! Unknown backend names fall back to `file` with a warning.

use std::env;
use std::path::PathBuf;

use crate::backend::{FileStorage, MemoryStorage, NullStorage, StorageBackend, state_dir_or_fallback};
use crate::store::StateStore;

/// Which backend a [`StateStore`] is built on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// JSON file at the given path.
    File(PathBuf),
    /// Process-local memory.
    Memory,
    /// No persistence.
    None,
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Selected backend.
    pub backend: BackendKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File(default_state_file()),
        }
    }
}

fn default_state_file() -> PathBuf {
    state_dir_or_fallback().join("tabula").join("state.json")
}

impl StoreConfig {
    /// Read the configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through `lookup` (env-like key -> value).
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = lookup("TABULA_STATE_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_state_file);

        let backend = match lookup("TABULA_STATE_BACKEND")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("") | Some("file") => BackendKind::File(path),
            Some("memory") => BackendKind::Memory,
            Some("none") | Some("off") => BackendKind::None,
            Some(other) => {
                tracing::warn!(backend = other, "unknown TABULA_STATE_BACKEND, using file");
                BackendKind::File(path)
            }
        };
        Self { backend }
    }

    /// Use an in-memory backend.
    #[must_use]
    pub fn with_memory(mut self) -> Self {
        self.backend = BackendKind::Memory;
        self
    }

    /// Use a file backend at `path`.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backend = BackendKind::File(path.into());
        self
    }

    /// Build the backend.
    #[must_use]
    pub fn build_backend(&self) -> Box<dyn StorageBackend> {
        match &self.backend {
            BackendKind::File(path) => Box::new(FileStorage::new(path)),
            BackendKind::Memory => Box::new(MemoryStorage::new()),
            BackendKind::None => Box::new(NullStorage),
        }
    }

    /// Build a store on the configured backend.
    #[must_use]
    pub fn open(&self) -> StateStore {
        StateStore::new(self.build_backend())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_file_backend() {
        let config = StoreConfig::from_lookup(lookup(&[]));
        assert!(matches!(config.backend, BackendKind::File(_)));
    }

    #[test]
    fn explicit_file_path() {
        let config = StoreConfig::from_lookup(lookup(&[("TABULA_STATE_FILE", "/tmp/t.json")]));
        assert_eq!(config.backend, BackendKind::File(PathBuf::from("/tmp/t.json")));
    }

    #[test]
    fn memory_and_none_backends() {
        let memory = StoreConfig::from_lookup(lookup(&[("TABULA_STATE_BACKEND", "Memory")]));
        assert_eq!(memory.backend, BackendKind::Memory);
        let none = StoreConfig::from_lookup(lookup(&[("TABULA_STATE_BACKEND", "none")]));
        assert_eq!(none.backend, BackendKind::None);
        assert!(!none.open().is_available());
    }

    #[test]
    fn unknown_backend_falls_back_to_file() {
        let config = StoreConfig::from_lookup(lookup(&[("TABULA_STATE_BACKEND", "redis")]));
        assert!(matches!(config.backend, BackendKind::File(_)));
    }

    #[test]
    fn builders_override() {
        let config = StoreConfig::default().with_memory();
        assert_eq!(config.open().backend_name(), "MemoryStorage");
    }
}
