//! View-state store end-to-end tests.
//!
//! # Running Tests
//!
//! ```sh
//! cargo test -p tabula-persist --test view_state_store_e2e
//! ```
//!
//! # Invariants
//!
//! 1. **Round-trip integrity**: a value written with `set` reads back equal.
//! 2. **Fallback on absence**: missing keys return the supplied fallback.
//! 3. **Graceful degradation**: corrupt data and missing backends never
//!    panic or error; readers get the fallback.
//! 4. **Restart survival**: file-backed values survive a new store.
//! 5. **Concurrent safety**: several threads can share one store.

#![cfg(test)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Barrier};
use std::thread;

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use tabula_persist::{
    FileStorage, MemoryStorage, StateKey, StateStore, StorageBackend, StoreConfig, StoredEntry,
};

// ============================================================================
// Test Utilities
// ============================================================================

fn log_jsonl(event: &str, case: &str, passed: bool, details: &str) {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    eprintln!(
        r#"{{"event":"{event}","case":"{case}","passed":{passed},"details":"{details}","timestamp":{timestamp}}}"#
    );
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SortEntry {
    id: String,
    desc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TableSnapshot {
    sort_by: Vec<SortEntry>,
    filters: BTreeMap<String, serde_json::Value>,
    page_size: usize,
    hidden_columns: Vec<String>,
}

fn snapshot() -> TableSnapshot {
    TableSnapshot {
        sort_by: vec![SortEntry {
            id: "name".into(),
            desc: true,
        }],
        filters: [("age".to_string(), serde_json::json!([0, 5]))]
            .into_iter()
            .collect(),
        page_size: 25,
        hidden_columns: vec!["namespace".into()],
    }
}

// ============================================================================
// 1. Round Trip
// ============================================================================

#[test]
fn round_trip_in_memory() {
    init_tracing();
    let store = StateStore::in_memory();
    let key = StateKey::table("Systems").canonical();

    store.set(&key, &snapshot());
    let restored: TableSnapshot = store.get(&key, TableSnapshot::default());
    assert_eq!(restored, snapshot());

    log_jsonl("round_trip", "in_memory", true, "snapshot equal after get");
}

#[test]
fn missing_key_returns_fallback_unchanged() {
    let store = StateStore::in_memory();
    let fallback = snapshot();
    let got = store.get("tableState:Nope", fallback.clone());
    assert_eq!(got, fallback);

    log_jsonl("round_trip", "missing_key", true, "fallback returned");
}

#[test]
fn file_store_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");
    let key = StateKey::table("Commands").canonical();

    {
        let store = StateStore::with_file(&path);
        store.set(&key, &snapshot());
        store.set(&StateKey::last_known("systems").canonical(), &"default");
    }

    let store = StateStore::with_file(&path);
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&key, TableSnapshot::default()), snapshot());
    assert_eq!(
        store.get("lastKnown_systems", String::new()),
        "default".to_string()
    );

    log_jsonl("restart", "file_store", true, "entries reloaded from disk");
}

// ============================================================================
// 2. Graceful Degradation
// ============================================================================

#[test]
fn corrupt_value_falls_back_per_key() {
    init_tracing();
    let storage = MemoryStorage::new();
    let mut entries = HashMap::new();
    entries.insert(
        "tableState:Broken".to_string(),
        StoredEntry::new("tableState:Broken", "{not json"),
    );
    entries.insert(
        "tableState:Fine".to_string(),
        StoredEntry::new("tableState:Fine", r#"{"pageSize":10}"#),
    );
    storage.save_all(&entries).unwrap();

    let store = StateStore::new(Box::new(storage));
    let broken: TableSnapshot = store.get("tableState:Broken", TableSnapshot::default());
    assert_eq!(broken, TableSnapshot::default());

    let fine: serde_json::Value = store.get("tableState:Fine", serde_json::Value::Null);
    assert_eq!(fine["pageSize"], 10);

    log_jsonl("degradation", "corrupt_value", true, "only the corrupt key falls back");
}

#[test]
fn corrupt_file_yields_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"\x00\x01garbage").unwrap();

    let store = StateStore::with_file(&path);
    assert!(store.is_empty());
    assert_eq!(store.get("tableState:X", 7u32), 7);

    // Writing replaces the corrupt file with a valid one.
    store.set("tableState:X", &8u32);
    let reopened = StateStore::new(Box::new(FileStorage::new(&path)));
    assert_eq!(reopened.get("tableState:X", 0u32), 8);

    log_jsonl("degradation", "corrupt_file", true, "corrupt file replaced on write");
}

#[test]
fn unavailable_backend_never_fails_callers() {
    init_tracing();
    let store = StoreConfig::default().with_memory();
    assert!(store.open().is_available());

    let store = StateStore::unavailable();
    assert!(!store.is_available());
    store.set("tableState:T", &snapshot());
    // The value is still served from the cache for this session.
    assert_eq!(store.get("tableState:T", TableSnapshot::default()), snapshot());

    let fresh = StateStore::unavailable();
    assert_eq!(fresh.get("tableState:T", TableSnapshot::default()), TableSnapshot::default());

    log_jsonl("degradation", "unavailable", true, "set swallowed, get falls back");
}

#[test]
fn quota_exceeded_is_swallowed() {
    let store = StateStore::new(Box::new(MemoryStorage::new().with_quota(16)));
    store.set("tableState:Big", &snapshot());
    assert!(store.keys().contains(&"tableState:Big".to_string()));

    log_jsonl("degradation", "quota", true, "quota failure logged, not raised");
}

// ============================================================================
// 3. Concurrency
// ============================================================================

#[test]
fn concurrent_tables_share_one_store() {
    let store = Arc::new(StateStore::in_memory());
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..25usize {
                    let key = StateKey::table(format!("table-{t}")).canonical();
                    store.set(&key, &i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        let key = StateKey::table(format!("table-{t}")).canonical();
        assert_eq!(store.get(&key, 0usize), 24);
    }

    log_jsonl("concurrency", "shared_store", true, "last write per table wins");
}

// ============================================================================
// 4. Properties
// ============================================================================

proptest! {
    #[test]
    fn set_then_get_round_trips(
        page_size in 1usize..500,
        hidden in proptest::collection::vec("[a-z]{1,8}", 0..5),
        desc in any::<bool>(),
        id in "[a-zA-Z][a-zA-Z0-9_]{0,12}",
    ) {
        let store = StateStore::in_memory();
        let value = TableSnapshot {
            sort_by: vec![SortEntry { id: id.clone(), desc }],
            filters: BTreeMap::new(),
            page_size,
            hidden_columns: hidden,
        };
        let key = StateKey::table(id).canonical();
        store.set(&key, &value);
        prop_assert_eq!(store.get(&key, TableSnapshot::default()), value);
    }
}
