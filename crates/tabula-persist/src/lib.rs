#![forbid(unsafe_code)]

//! View-state persistence for tabula tables.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         StateStore                            │
//! │   - get(key, fallback) / set(key, value), never fails         │
//! │   - write-through cache of serialized JSON text               │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       StorageBackend                          │
//! │   - MemoryStorage: in-memory (tests, ephemeral hosts)         │
//! │   - FileStorage: JSON file with atomic rename                 │
//! │   - NullStorage: no persistence available                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Invariants
//!
//! 1. **Graceful degradation**: storage failures never panic and never reach
//!    `get`/`set` callers; they are logged through `tracing`.
//! 2. **Atomic writes**: file storage uses write-rename.
//! 3. **Per-key isolation**: an unreadable value only affects its own key.

pub mod backend;
pub mod config;
pub mod stateful;
pub mod store;

pub use backend::{
    FileStorage, MemoryStorage, NullStorage, StorageBackend, StorageError, StorageResult,
    StoredEntry,
};
pub use config::{BackendKind, StoreConfig};
pub use stateful::{StateKey, Stateful};
pub use store::StateStore;
