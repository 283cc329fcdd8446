//! Pagination models for client-computed and server-driven tables.
//!
//! In client mode every count comes from the [`Projection`]. In server mode
//! the host owns the authoritative counts ([`ServerPagination`]) and the
//! engine only mirrors the page position the host asked for.

use crate::projection::Projection;

/// Choices of the rows-per-page selector.
pub const ROWS_PER_PAGE_OPTIONS: [usize; 3] = [10, 25, 100];

/// Counts supplied by a server-driven host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerPagination {
    /// Records matching the server-side filter.
    pub records_filtered: usize,
    /// Records before filtering.
    pub records_total: usize,
}

impl ServerPagination {
    #[must_use]
    pub fn new(records_filtered: usize, records_total: usize) -> Self {
        Self {
            records_filtered,
            records_total,
        }
    }
}

/// The slice of rows a pagination control describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
    /// 1-based first row on the page, 0 when there are no rows.
    pub from: usize,
    /// 1-based last row on the page.
    pub to: usize,
    /// Rows being paginated.
    pub count: usize,
    /// Unfiltered total, known in server mode.
    pub total: Option<usize>,
}

impl PageWindow {
    /// Window over `count` rows.
    #[must_use]
    pub fn new(page_index: usize, page_size: usize, count: usize) -> Self {
        let page_size = page_size.max(1);
        let page_count = count.div_ceil(page_size);
        let from = if count == 0 { 0 } else { page_index * page_size + 1 };
        let to = count.min((page_index + 1) * page_size);
        Self {
            page_index,
            page_size,
            page_count,
            from,
            to,
            count,
            total: None,
        }
    }

    /// Window of a client-computed projection.
    #[must_use]
    pub fn client(projection: &Projection, page_size: usize) -> Self {
        Self::new(projection.page_index, page_size, projection.row_count)
    }

    /// Window of a server-driven table.
    #[must_use]
    pub fn server(server: ServerPagination, page_index: usize, page_size: usize) -> Self {
        Self {
            total: Some(server.records_total),
            ..Self::new(page_index, page_size, server.records_filtered)
        }
    }

    /// Whether a previous page exists.
    #[must_use]
    pub fn can_previous(&self) -> bool {
        self.page_index > 0
    }

    /// Whether a next page exists.
    #[must_use]
    pub fn can_next(&self) -> bool {
        self.page_index + 1 < self.page_count
    }

    /// The control is not shown when there is nothing to paginate.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.count == 0
    }

    /// Displayed-rows label.
    ///
    /// Client mode: `1–10 of 42`. Server mode: `Displaying 1–10 of 42`,
    /// with ` (filtered from 100)` when the filtered count differs.
    #[must_use]
    pub fn label(&self) -> String {
        match self.total {
            None => format!("{}–{} of {}", self.from, self.to, self.count),
            Some(total) if total == self.count => {
                format!("Displaying {}–{} of {}", self.from, self.to, self.count)
            }
            Some(total) => format!(
                "Displaying {}–{} of {} (filtered from {total})",
                self.from, self.to, self.count
            ),
        }
    }
}

/// How a requested page change is applied to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    Next,
    Previous,
    Goto(usize),
}

impl PageStep {
    /// Classify a move from `current` to `requested`.
    #[must_use]
    pub fn between(current: usize, requested: usize) -> Self {
        if requested == current + 1 {
            PageStep::Next
        } else if current > 0 && requested == current - 1 {
            PageStep::Previous
        } else {
            PageStep::Goto(requested)
        }
    }
}
