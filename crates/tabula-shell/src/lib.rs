#![forbid(unsafe_code)]

//! Presentation shell for tabula tables.
//!
//! [`TableShell`] wraps one [`TableEngine`](tabula_engine::TableEngine) and
//! builds a [`ShellView`] in a fixed order:
//!
//! 1. toolbar (title, column-visibility toggles, caller slot)
//! 2. active-filter chip bar
//! 3. optional caller header content
//! 4. table head with sort, group and resize affordances
//! 5. body of plain, grouped, aggregated and placeholder cells
//! 6. pagination control, client-computed or server-driven
//!
//! Interactions come back as [`ShellEvent`]s. [`TextRenderer`] turns a view
//! into lines of text.
//!
//! # Example
//!
//! ```
//! use tabula_engine::{Column, Row, TableEngine};
//! use tabula_shell::{ShellEvent, TableShell, TextRenderer};
//!
//! let engine = TableEngine::builder("people", vec![Column::new("name")])
//!     .rows([Row::new().with("name", "b"), Row::new().with("name", "a")])
//!     .build()?;
//! let mut shell = TableShell::new(engine).title("People");
//! shell.handle(ShellEvent::HeaderClicked("name".into()));
//!
//! let lines = TextRenderer::new().render(&shell.view());
//! assert_eq!(lines[0], "People  [x] name");
//! # Ok::<(), tabula_engine::ColumnError>(())
//! ```

pub mod chip_bar;
pub mod event;
pub mod pagination;
pub mod shell;
pub mod text;
pub mod toolbar;
pub mod view;

pub use chip_bar::{ChipBar, FilterChip};
pub use event::ShellEvent;
pub use pagination::{PageChangeFn, PageSizeChangeFn, PaginationMode, PaginationView, ServerPaging};
pub use shell::TableShell;
pub use text::{PIXELS_PER_CELL, TextRenderer, pad, truncate_to_width, truncate_with_ellipsis};
pub use toolbar::{Toolbar, VisibilityToggle};
pub use view::{CellFormatter, CellView, RowView, ShellView};
