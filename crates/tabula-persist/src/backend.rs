//! Where persisted view state physically lives.
//!
//! Every backend holds a flat map from storage key (`tableState:<id>`) to the
//! JSON text a table wrote. Backends never look inside that text; parsing is
//! the [`StateStore`](crate::StateStore)'s job, so a value one table cannot
//! read never stops another table from restoring.
//!
//! | Backend | Reads | Writes |
//! |---------|-------|--------|
//! | [`MemoryStorage`] | what this process wrote | always accepted, unless over quota |
//! | [`FileStorage`] | the JSON document on disk | temp file, then rename |
//! | [`NullStorage`] | nothing | rejected with [`StorageError::Unavailable`] |

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Why a backend could not serve a request.
#[derive(Debug)]
pub enum StorageError {
    /// The state file could not be read, written or renamed.
    Io(std::io::Error),
    /// The state document is not the JSON shape a backend expects.
    Serialization(String),
    /// An internal lock was poisoned by a panicking writer.
    Corruption(String),
    /// Nothing can be persisted right now: no backend, or the quota is full.
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "view state I/O failed: {err}"),
            Self::Serialization(msg) => write!(f, "unreadable view state document: {msg}"),
            Self::Corruption(msg) => write!(f, "view state store corruption: {msg}"),
            Self::Unavailable(msg) => write!(f, "view state storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Self::Io(err) = self {
            Some(err)
        } else {
            None
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Serialized view state for one key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    /// JSON text exactly as the table serialized it.
    pub data: String,
}

impl StoredEntry {
    #[must_use]
    pub fn new(key: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
        }
    }

    /// Bytes this entry occupies against a quota.
    #[must_use]
    pub fn footprint(&self) -> usize {
        self.key.len() + self.data.len()
    }
}

/// A place that can hold every table's serialized view state.
///
/// `save_all` receives the complete key set and replaces whatever was held
/// before; a backend that cannot take the whole set must keep the previous
/// one. `load_all` on a backend that never saved returns an empty map.
pub trait StorageBackend: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &str;

    fn load_all(&self) -> StorageResult<HashMap<String, StoredEntry>>;

    fn save_all(&self, entries: &HashMap<String, StoredEntry>) -> StorageResult<()>;

    fn clear(&self) -> StorageResult<()>;

    /// Whether a write issued now has a chance of succeeding.
    fn is_available(&self) -> bool {
        true
    }
}

/// Lets several stores (or a store and its host) share one backend.
impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load_all(&self) -> StorageResult<HashMap<String, StoredEntry>> {
        (**self).load_all()
    }

    fn save_all(&self, entries: &HashMap<String, StoredEntry>) -> StorageResult<()> {
        (**self).save_all(entries)
    }

    fn clear(&self) -> StorageResult<()> {
        (**self).clear()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Corruption("memory storage lock poisoned".into())
}

/// Process-local backend.
///
/// Hosts without durable storage use it so tables still remember their view
/// for the lifetime of the process. [`with_quota`](Self::with_quota) makes it
/// behave like a browser store that is full.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, StoredEntry>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start out holding `entries`, as if a previous session saved them.
    #[must_use]
    pub fn with_entries(entries: HashMap<String, StoredEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
            quota_bytes: None,
        }
    }

    /// Refuse any save whose entries add up to more than `bytes`.
    #[must_use]
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, StoredEntry>>> {
        self.entries.read().map_err(poisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, StoredEntry>>> {
        self.entries.write().map_err(poisoned)
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn load_all(&self) -> StorageResult<HashMap<String, StoredEntry>> {
        Ok(self.read()?.clone())
    }

    fn save_all(&self, entries: &HashMap<String, StoredEntry>) -> StorageResult<()> {
        if let Some(quota) = self.quota_bytes {
            let needed: usize = entries.values().map(StoredEntry::footprint).sum();
            if needed > quota {
                return Err(StorageError::Unavailable(format!(
                    "{needed} bytes of view state exceed the {quota} byte quota"
                )));
            }
        }
        *self.write()? = entries.clone();
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.write()?.clear();
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.entries.read().map(|e| e.len()).unwrap_or(0);
        f.debug_struct("MemoryStorage")
            .field("tables", &tables)
            .field("quota_bytes", &self.quota_bytes)
            .finish()
    }
}

/// Stand-in when the host offers no storage at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStorage;

impl StorageBackend for NullStorage {
    fn name(&self) -> &str {
        "NullStorage"
    }

    fn load_all(&self) -> StorageResult<HashMap<String, StoredEntry>> {
        Ok(HashMap::new())
    }

    fn save_all(&self, _entries: &HashMap<String, StoredEntry>) -> StorageResult<()> {
        Err(StorageError::Unavailable("host provides no view state storage".into()))
    }

    fn clear(&self) -> StorageResult<()> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}

mod file {
    use std::collections::HashMap;
    use std::fmt;
    use std::fs;
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    use serde::{Deserialize, Serialize};

    use super::{StorageBackend, StorageError, StorageResult, StoredEntry};

    const DOCUMENT_VERSION: u32 = 1;

    /// What sits on disk. Values stay JSON text so one table's unreadable
    /// state never hides another's.
    #[derive(Serialize, Deserialize)]
    struct Document {
        format_version: u32,
        entries: HashMap<String, String>,
    }

    /// View state kept in a single JSON document:
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "entries": {
    ///     "tableState:Jobs": "{\"sortBy\":[{\"id\":\"name\",\"desc\":true}],\"pageSize\":100}"
    ///   }
    /// }
    /// ```
    ///
    /// Saves go to a sibling `.json.tmp` file that is synced and then renamed
    /// over the document, so readers see the old set or the new one.
    pub struct FileStorage {
        path: PathBuf,
    }

    impl FileStorage {
        /// Storage at `path`. Nothing is touched until the first save.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn staging_path(&self) -> PathBuf {
            self.path.with_extension("json.tmp")
        }

        fn read_document(&self) -> StorageResult<Option<Document>> {
            let file = match fs::File::open(&self.path) {
                Ok(file) => file,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(err.into()),
            };
            serde_json::from_reader(BufReader::new(file))
                .map(Some)
                .map_err(|err| StorageError::Serialization(format!("{}: {err}", self.path.display())))
        }

        fn write_document(&self, document: &Document) -> StorageResult<()> {
            if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            let staging = self.staging_path();
            let file = fs::File::create(&staging)?;
            let mut out = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut out, document)?;
            out.flush()?;
            out.get_ref().sync_all()?;
            drop(out);
            fs::rename(&staging, &self.path)?;
            Ok(())
        }
    }

    /// `$XDG_STATE_HOME`, else `~/.local/state`, else the working directory.
    pub(crate) fn state_dir_or_fallback() -> PathBuf {
        std::env::var_os("XDG_STATE_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    impl StorageBackend for FileStorage {
        fn name(&self) -> &str {
            "FileStorage"
        }

        fn load_all(&self) -> StorageResult<HashMap<String, StoredEntry>> {
            let Some(document) = self.read_document()? else {
                return Ok(HashMap::new());
            };
            if document.format_version != DOCUMENT_VERSION {
                tracing::warn!(
                    path = %self.path.display(),
                    found = document.format_version,
                    supported = DOCUMENT_VERSION,
                    "unknown view state document version, starting empty"
                );
                return Ok(HashMap::new());
            }
            Ok(document
                .entries
                .into_iter()
                .map(|(key, data)| (key.clone(), StoredEntry { key, data }))
                .collect())
        }

        fn save_all(&self, entries: &HashMap<String, StoredEntry>) -> StorageResult<()> {
            let document = Document {
                format_version: DOCUMENT_VERSION,
                entries: entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), entry.data.clone()))
                    .collect(),
            };
            self.write_document(&document)?;
            tracing::debug!(
                path = %self.path.display(),
                tables = entries.len(),
                "wrote view state document"
            );
            Ok(())
        }

        fn clear(&self) -> StorageResult<()> {
            match fs::remove_file(&self.path) {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            }
        }

        fn is_available(&self) -> bool {
            let dir = match self.path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                Some(_) => Path::new("."),
                None => return false,
            };
            if fs::create_dir_all(dir).is_err() {
                return false;
            }
            let marker = dir.join(".tabula_write_check");
            let writable = fs::write(&marker, b"ok").is_ok();
            let _ = fs::remove_file(&marker);
            writable
        }
    }

    impl fmt::Debug for FileStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_tuple("FileStorage").field(&self.path).finish()
        }
    }
}

pub use file::FileStorage;
pub(crate) use file::state_dir_or_fallback;

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(pairs: &[(&str, &str)]) -> HashMap<String, StoredEntry> {
        pairs
            .iter()
            .map(|(key, data)| (key.to_string(), StoredEntry::new(*key, *data)))
            .collect()
    }

    #[test]
    fn memory_keeps_the_last_saved_set() {
        let storage = MemoryStorage::new();
        storage
            .save_all(&saved(&[("tableState:Jobs", r#"{"pageSize":25}"#), ("tableState:Systems", "{}")]))
            .unwrap();
        storage
            .save_all(&saved(&[("tableState:Jobs", r#"{"pageSize":100}"#)]))
            .unwrap();

        let loaded = storage.load_all().unwrap();
        assert_eq!(loaded.len(), 1, "save replaces, never merges");
        assert_eq!(loaded["tableState:Jobs"].data, r#"{"pageSize":100}"#);
    }

    #[test]
    fn full_quota_keeps_previous_set() {
        let storage = MemoryStorage::new().with_quota(24);
        storage.save_all(&saved(&[("tableState:a", "{}")])).unwrap();

        let err = storage
            .save_all(&saved(&[("tableState:a", "{}"), ("tableState:b", "[1,2,3,4,5]")]))
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(err.to_string().contains("quota"));
        assert_eq!(storage.load_all().unwrap().len(), 1);
    }

    #[test]
    fn shared_backend_sees_the_same_entries() {
        let storage = Arc::new(MemoryStorage::new());
        let handle = Arc::clone(&storage);
        handle.save_all(&saved(&[("tableState:x", "1")])).unwrap();
        assert_eq!(storage.load_all().unwrap()["tableState:x"].data, "1");
        assert_eq!(StorageBackend::name(&handle), "MemoryStorage");
    }

    #[test]
    fn null_backend_refuses_writes() {
        assert!(!NullStorage.is_available());
        assert!(NullStorage.load_all().unwrap().is_empty());
        assert!(matches!(
            NullStorage.save_all(&HashMap::new()),
            Err(StorageError::Unavailable(_))
        ));
        NullStorage.clear().unwrap();
    }

    #[test]
    fn only_io_errors_carry_a_source() {
        use std::error::Error as _;
        let io = StorageError::from(std::io::Error::other("disk gone"));
        assert!(io.source().is_some());
        assert!(io.to_string().contains("disk gone"));
        assert!(StorageError::Corruption("x".into()).source().is_none());
    }

    #[test]
    fn file_document_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("state.json");
        FileStorage::new(&path)
            .save_all(&saved(&[("tableState:Jobs", r#"{"pageSize":100}"#)]))
            .unwrap();
        assert!(!path.with_extension("json.tmp").exists(), "staging file renamed away");

        let loaded = FileStorage::new(&path).load_all().unwrap();
        assert_eq!(loaded["tableState:Jobs"].key, "tableState:Jobs");
        assert_eq!(loaded["tableState:Jobs"].data, r#"{"pageSize":100}"#);
    }

    #[test]
    fn missing_document_is_a_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("never-written.json"));
        assert!(storage.load_all().unwrap().is_empty());
        storage.clear().unwrap();
    }

    #[test]
    fn garbage_document_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "tableState: sorted by name").unwrap();
        assert!(matches!(
            FileStorage::new(&path).load_all(),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn newer_document_version_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"format_version":2,"entries":{"tableState:a":"{}"}}"#).unwrap();
        assert!(FileStorage::new(&path).load_all().unwrap().is_empty());
    }

    #[test]
    fn clear_removes_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let storage = FileStorage::new(&path);
        storage.save_all(&saved(&[("k", "1")])).unwrap();
        assert!(storage.is_available());
        storage.clear().unwrap();
        assert!(!path.exists());
    }
}
