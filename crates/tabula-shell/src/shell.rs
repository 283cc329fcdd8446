//! [`TableShell`]: owns one engine, builds its [`ShellView`] and routes
//! [`ShellEvent`]s back into it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tabula_engine::{ServerPagination, TableEngine};

use crate::chip_bar::ChipBar;
use crate::event::ShellEvent;
use crate::pagination::{PaginationMode, PaginationView, ServerPaging};
use crate::toolbar::Toolbar;
use crate::view::{CellFormatter, ShellView, body_rows};

/// Presentation shell around a [`TableEngine`].
#[derive(Debug)]
pub struct TableShell {
    engine: TableEngine,
    title: Option<String>,
    toolbar_slot: Option<String>,
    header_content: Option<String>,
    pagination: PaginationMode,
    formatters: Formatters,
}

#[derive(Default, Clone)]
struct Formatters(HashMap<String, CellFormatter>);

impl std::fmt::Debug for Formatters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl TableShell {
    /// Client-paginated shell.
    #[must_use]
    pub fn new(engine: TableEngine) -> Self {
        Self {
            engine,
            title: None,
            toolbar_slot: None,
            header_content: None,
            pagination: PaginationMode::Client,
            formatters: Formatters::default(),
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Caller content placed in the toolbar after the visibility toggles.
    #[must_use]
    pub fn toolbar_slot(mut self, content: impl Into<String>) -> Self {
        self.toolbar_slot = Some(content.into());
        self
    }

    /// Caller content placed between the chip bar and the table head.
    #[must_use]
    pub fn header_content(mut self, content: impl Into<String>) -> Self {
        self.header_content = Some(content.into());
        self
    }

    /// Display text for values of column `id`.
    #[must_use]
    pub fn formatter(
        mut self,
        id: impl Into<String>,
        f: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.formatters.0.insert(id.into(), Arc::new(f));
        self
    }

    /// Switch to server-driven pagination. The engine should be built with
    /// manual pagination so it does not slice the host's page again.
    #[must_use]
    pub fn server_pagination(mut self, paging: ServerPaging) -> Self {
        if !self.engine.config().manual_pagination {
            tracing::warn!(
                table = self.engine.name(),
                "server pagination on an engine that paginates rows itself"
            );
        }
        let counts = paging.counts();
        self.pagination = PaginationMode::Server(paging);
        self.pagination
            .set_server_counts(&mut self.engine, counts, Instant::now());
        self
    }

    #[must_use]
    pub fn engine(&self) -> &TableEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TableEngine {
        &mut self.engine
    }

    #[must_use]
    pub fn pagination(&self) -> &PaginationMode {
        &self.pagination
    }

    /// Counts from a fresh server response.
    pub fn set_server_counts(&mut self, counts: ServerPagination) {
        self.pagination
            .set_server_counts(&mut self.engine, counts, Instant::now());
    }

    /// Build the view of the current projection.
    #[must_use]
    pub fn view(&self) -> ShellView {
        let engine = &self.engine;
        let projection = engine.projection();
        let head = projection.header_groups.clone();
        let body = body_rows(&projection.page, &head, &self.formatters.0);
        ShellView {
            toolbar: Toolbar::build(
                engine.columns(),
                engine.state(),
                self.title.as_deref(),
                self.toolbar_slot.as_deref(),
            ),
            chips: ChipBar::build(engine.columns(), engine.state()),
            header_content: self.header_content.clone(),
            head,
            body,
            pagination: PaginationView::build(
                self.pagination.window(engine),
                &engine.config().page_size_options,
            ),
        }
    }

    /// Route `event` now. Returns whether the engine changed.
    pub fn handle(&mut self, event: ShellEvent) -> bool {
        self.handle_at(event, Instant::now())
    }

    /// Route `event` at `now`.
    pub fn handle_at(&mut self, event: ShellEvent, now: Instant) -> bool {
        tracing::trace!(?event, "shell event");
        match event {
            ShellEvent::PageRequested(page) => {
                self.pagination.change_page(&mut self.engine, page, now)
            }
            ShellEvent::NextPageRequested => {
                let page = self.engine.state().page_index + 1;
                self.pagination.change_page(&mut self.engine, page, now)
            }
            ShellEvent::PreviousPageRequested => match self.engine.state().page_index {
                0 => false,
                current => self.pagination.change_page(&mut self.engine, current - 1, now),
            },
            ShellEvent::PageSizeSelected(size) => {
                self.pagination.change_page_size(&mut self.engine, size, now)
            }
            other => match other.into_action() {
                Some(action) => self.engine.dispatch_at(action, now),
                None => false,
            },
        }
    }

    /// Drive the engine's debounced persistence.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        self.engine.tick_at(now)
    }

    /// Tear down, cancelling any pending write.
    pub fn unmount(self) {
        let _ = self.engine.unmount();
    }
}
