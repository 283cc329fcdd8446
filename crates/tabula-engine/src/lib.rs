#![forbid(unsafe_code)]

//! Headless data-table engine.
//!
//! Consumes rows and column definitions, reconciles sort, filter, grouping,
//! column order/visibility/width, page position and selection into one
//! [`Projection`], and persists the view description through a
//! [`tabula_persist::StateStore`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  TableAction   ┌──────────────────────────────────────┐
//! │    host /    │ ─────────────▶ │              TableEngine              │
//! │    shell     │ ◀───────────── │  ViewState ─▶ pipeline ─▶ Projection  │
//! └──────────────┘   Projection   └──────────────────────────────────────┘
//!                                                   │ persisted slice
//!                                                   ▼
//!                                   Debouncer ─▶ StateStore (tick_at)
//! ```
//!
//! # Example
//!
//! ```
//! use tabula_engine::{Column, FilterStrategy, FilterValue, Row, TableEngine};
//!
//! let columns = vec![
//!     Column::new("name"),
//!     Column::new("age").filter(FilterStrategy::Numeric),
//! ];
//! let rows = vec![
//!     Row::new().with("name", "b").with("age", 5),
//!     Row::new().with("name", "a").with("age", 10),
//! ];
//! let mut table = TableEngine::builder("people", columns).rows(rows).build()?;
//! assert_eq!(table.projection().page[0].key.as_str(), "1");
//!
//! table.set_filter("age", FilterValue::range(Some(0.0), Some(5.0)));
//! assert_eq!(table.projection().filtered_row_count, 1);
//! # Ok::<(), tabula_engine::ColumnError>(())
//! ```

pub mod column;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod filter;
pub mod pagination;
pub mod pipeline;
pub mod projection;
pub mod row;
pub mod state;

pub use column::{
    Accessor, Aggregation, Align, Column, ColumnError, ColumnFlags, ColumnSet, WidthBounds,
};
pub use config::EngineConfig;
pub use debounce::{Debounced, Debouncer};
pub use engine::{TableAction, TableEngine, TableEngineBuilder};
pub use filter::{FilterStrategy, FilterValue, RowValues, fuzzy_text, get_min_and_max, numeric};
pub use pagination::{PageStep, PageWindow, ROWS_PER_PAGE_OPTIONS, ServerPagination};
pub use projection::{Cell, CellKind, Header, HeaderGroup, Projection, ProjectedRow};
pub use row::{Row, RowKey};
pub use state::{PersistedViewState, SortDirection, SortRule, ViewState};
