#![forbid(unsafe_code)]

//! tabula public facade crate.
//!
//! Re-exports the engine, the persisted view-state store and (with the
//! `shell` feature) the presentation shell, plus a prelude for day-to-day
//! usage.
//!
//! ```
//! use tabula::prelude::*;
//!
//! let store = StateStore::in_memory().shared();
//! let mut table = TableEngine::builder("people", vec![Column::new("name")])
//!     .rows([Row::new().with("name", "b"), Row::new().with("name", "a")])
//!     .store(store.clone())
//!     .build()?;
//! table.set_sort("name");
//! table.persist_now();
//! assert!(store.raw("tableState:people").is_some());
//! # Ok::<(), tabula::Error>(())
//! ```

use std::fmt;

// --- Engine re-exports -----------------------------------------------------

pub use tabula_engine::{
    Accessor, Aggregation, Align, Cell, CellKind, Column, ColumnError, ColumnFlags, ColumnSet,
    Debounced, Debouncer, EngineConfig, FilterStrategy, FilterValue, Header, HeaderGroup,
    PageStep, PageWindow, PersistedViewState, ProjectedRow, Projection, ROWS_PER_PAGE_OPTIONS,
    Row, RowKey, ServerPagination, SortDirection, SortRule, TableAction, TableEngine,
    TableEngineBuilder, ViewState, fuzzy_text, get_min_and_max, numeric,
};

// --- Persistence re-exports ------------------------------------------------

pub use tabula_persist::{
    BackendKind, FileStorage, MemoryStorage, NullStorage, StateKey, StateStore, Stateful,
    StorageBackend, StorageError, StoreConfig,
};

// --- Shell re-exports ------------------------------------------------------

#[cfg(feature = "shell")]
pub use tabula_shell::{
    PaginationMode, ServerPaging, ShellEvent, ShellView, TableShell, TextRenderer,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for tabula hosts.
#[derive(Debug)]
pub enum Error {
    /// Invalid column definitions.
    Column(ColumnError),
    /// Direct storage backend failure.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Column(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<ColumnError> for Error {
    fn from(err: ColumnError) -> Self {
        Self::Column(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

/// Standard result type for tabula APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Column, EngineConfig, Error, FilterStrategy, FilterValue, Result, Row, SortRule,
        StateStore, TableAction, TableEngine, ViewState,
    };

    #[cfg(feature = "shell")]
    pub use crate::{ShellEvent, TableShell, TextRenderer};

    pub use crate::{engine, persist};
}

pub use tabula_engine as engine;
pub use tabula_persist as persist;
#[cfg(feature = "shell")]
pub use tabula_shell as shell;
