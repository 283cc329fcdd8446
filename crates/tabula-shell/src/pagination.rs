//! Pagination control: client-computed or server-driven.
//!
//! In server mode the host owns the row counts. Page and page-size changes
//! still move the engine (so the control reflects them immediately) and are
//! then forwarded to the host's callbacks, which fetch the new page.

use std::fmt;
use std::time::Instant;

use tabula_engine::{PageStep, PageWindow, ServerPagination, TableAction, TableEngine};

/// Called with the requested 0-based page index.
pub type PageChangeFn = Box<dyn FnMut(usize) + Send>;
/// Called with the selected rows-per-page.
pub type PageSizeChangeFn = Box<dyn FnMut(usize) + Send>;

/// Host side of a server-driven table.
pub struct ServerPaging {
    counts: ServerPagination,
    on_page_change: PageChangeFn,
    on_page_size_change: PageSizeChangeFn,
}

impl ServerPaging {
    #[must_use]
    pub fn new(
        counts: ServerPagination,
        on_page_change: impl FnMut(usize) + Send + 'static,
        on_page_size_change: impl FnMut(usize) + Send + 'static,
    ) -> Self {
        Self {
            counts,
            on_page_change: Box::new(on_page_change),
            on_page_size_change: Box::new(on_page_size_change),
        }
    }

    /// Latest counts reported by the host.
    #[must_use]
    pub fn counts(&self) -> ServerPagination {
        self.counts
    }
}

impl fmt::Debug for ServerPaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerPaging")
            .field("counts", &self.counts)
            .finish_non_exhaustive()
    }
}

/// Where row counts come from.
#[derive(Debug, Default)]
pub enum PaginationMode {
    /// Counts come from the engine's projection.
    #[default]
    Client,
    Server(ServerPaging),
}

impl PaginationMode {
    #[must_use]
    pub fn is_server(&self) -> bool {
        matches!(self, PaginationMode::Server(_))
    }

    /// Window shown by the control for the engine's current page.
    #[must_use]
    pub fn window(&self, engine: &TableEngine) -> PageWindow {
        let state = engine.state();
        match self {
            PaginationMode::Client => PageWindow::client(engine.projection(), state.page_size),
            PaginationMode::Server(server) => {
                PageWindow::server(server.counts, state.page_index, state.page_size)
            }
        }
    }

    /// Record new host counts and report the page count to the engine.
    pub fn set_server_counts(&mut self, engine: &mut TableEngine, counts: ServerPagination, now: Instant) {
        if let PaginationMode::Server(server) = self {
            server.counts = counts;
            let pages = self.window(engine).page_count;
            engine.dispatch_at(TableAction::SetPageCount(pages), now);
        }
    }

    /// Move to `requested`. Server mode uses the single-step actions for
    /// adjacent pages, then notifies the host.
    pub fn change_page(&mut self, engine: &mut TableEngine, requested: usize, now: Instant) -> bool {
        match self {
            PaginationMode::Client => {
                engine.dispatch_at(TableAction::GotoPage(to_index(requested)), now)
            }
            PaginationMode::Server(server) => {
                let action = match PageStep::between(engine.state().page_index, requested) {
                    PageStep::Next => TableAction::NextPage,
                    PageStep::Previous => TableAction::PreviousPage,
                    PageStep::Goto(page) => TableAction::GotoPage(to_index(page)),
                };
                let changed = engine.dispatch_at(action, now);
                tracing::debug!(page = requested, changed, "forwarding page change");
                (server.on_page_change)(requested);
                changed
            }
        }
    }

    /// Change rows per page. Server mode notifies the host first, then
    /// returns to the first page.
    pub fn change_page_size(&mut self, engine: &mut TableEngine, size: usize, now: Instant) -> bool {
        match self {
            PaginationMode::Client => engine.dispatch_at(TableAction::SetPageSize(size), now),
            PaginationMode::Server(server) => {
                tracing::debug!(size, "forwarding page size change");
                (server.on_page_size_change)(size);
                let pages = PageWindow::server(server.counts, 0, size).page_count;
                let resized = engine.dispatch_at(TableAction::SetPageSize(size), now);
                engine.dispatch_at(TableAction::SetPageCount(pages), now);
                let rewound = engine.dispatch_at(TableAction::GotoPage(0), now);
                resized || rewound
            }
        }
    }
}

fn to_index(page: usize) -> i64 {
    i64::try_from(page).unwrap_or(i64::MAX)
}

/// Pagination control view model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationView {
    pub window: PageWindow,
    pub label: String,
    /// Rows-per-page choices.
    pub options: Vec<usize>,
    pub can_previous: bool,
    pub can_next: bool,
}

impl PaginationView {
    /// `None` when there are no rows to paginate.
    #[must_use]
    pub fn build(window: PageWindow, options: &[usize]) -> Option<Self> {
        if window.is_hidden() {
            return None;
        }
        Some(Self {
            label: window.label(),
            options: options.to_vec(),
            can_previous: window.can_previous(),
            can_next: window.can_next(),
            window,
        })
    }
}
