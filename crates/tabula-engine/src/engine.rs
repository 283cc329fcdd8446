//! The view-state engine.
//!
//! [`TableEngine`] owns one table's rows, column set and [`ViewState`]. State
//! changes only through [`TableAction`]s; every action recomputes the
//! [`Projection`] and, when the persisted slice changed, schedules a
//! debounced write to the [`StateStore`].
//!
//! # Mount
//!
//! ```text
//! defaults ─▶ caller initial state ─▶ persisted snapshot ─▶ sanitize ─▶ default sort
//! ```
//!
//! Later sources override earlier ones field by field. After mount the sort
//! always holds exactly one rule (when any column exists).
//!
//! # Invariants
//!
//! 1. `page_index` addresses an existing page, or is 0 when there are none.
//! 2. `page_size >= 1`.
//! 3. Every id in the view state names a known column with the matching
//!    capability; anything else is dropped at mount and ignored by actions.
//! 4. At most one persistence write is pending; a new change restarts its
//!    quiet window.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tabula_persist::{StateKey, StateStore, Stateful};

use crate::column::{Column, ColumnError, ColumnFlags, ColumnSet};
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::filter::FilterValue;
use crate::pipeline::{
    PreparedRow, RowKeyFn, clamp_page, expand_rows, filter_rows, group_keys, group_rows,
    page_count, prepare_rows, sort_rows,
};
use crate::projection::{Projection, column_width, header_groups, project_row, visible_columns};
use crate::row::{Row, RowKey};
use crate::state::{PersistedViewState, SortRule, ViewState};

/// A state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TableAction {
    /// Replace the row set.
    SetRows(Vec<Row>),
    /// Sort by a column, or flip the direction when it is already sorted.
    SetSort(String),
    /// Add or remove a column from the grouping.
    ToggleGroup(String),
    /// Hide or show a column, or every column of a header group.
    ToggleColumnVisibility(String),
    /// New column order.
    ReorderColumns(Vec<String>),
    /// Change a column's width by `delta` pixels.
    ResizeColumn { id: String, delta: i32 },
    /// Set a column filter; `None` or an empty value removes it.
    SetFilter {
        id: String,
        value: Option<FilterValue>,
    },
    /// Remove every filter.
    ClearFilters,
    /// Jump to a page; out-of-range indices clamp.
    GotoPage(i64),
    NextPage,
    PreviousPage,
    /// Rows per page; the first visible row stays visible.
    SetPageSize(usize),
    /// Page count reported by the host under manual pagination.
    SetPageCount(usize),
    ToggleRowSelection(RowKey),
    /// Select every row, or clear the selection when all are selected.
    ToggleAllRowsSelected,
    /// Expand or collapse a group row.
    ToggleRowExpanded(RowKey),
}

impl TableAction {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            TableAction::SetRows(_) => "set_rows",
            TableAction::SetSort(_) => "set_sort",
            TableAction::ToggleGroup(_) => "toggle_group",
            TableAction::ToggleColumnVisibility(_) => "toggle_column_visibility",
            TableAction::ReorderColumns(_) => "reorder_columns",
            TableAction::ResizeColumn { .. } => "resize_column",
            TableAction::SetFilter { .. } => "set_filter",
            TableAction::ClearFilters => "clear_filters",
            TableAction::GotoPage(_) => "goto_page",
            TableAction::NextPage => "next_page",
            TableAction::PreviousPage => "previous_page",
            TableAction::SetPageSize(_) => "set_page_size",
            TableAction::SetPageCount(_) => "set_page_count",
            TableAction::ToggleRowSelection(_) => "toggle_row_selection",
            TableAction::ToggleAllRowsSelected => "toggle_all_rows_selected",
            TableAction::ToggleRowExpanded(_) => "toggle_row_expanded",
        }
    }
}

/// What an applied action requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Nothing changed.
    Ignored,
    /// Recompute; an out-of-range page clamps to the last page.
    Recompute,
    /// Recompute; an out-of-range page resets to the first page.
    RecomputeResetPage,
}

/// Builder for [`TableEngine`].
pub struct TableEngineBuilder {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
    initial_state: Option<ViewState>,
    config: EngineConfig,
    store: Option<Arc<StateStore>>,
    row_key: Option<RowKeyFn>,
}

impl TableEngineBuilder {
    /// Input rows.
    #[must_use]
    pub fn rows(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.rows = rows.into_iter().collect();
        self
    }

    /// Caller-supplied initial state. Persisted fields override it.
    #[must_use]
    pub fn initial_state(mut self, state: ViewState) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Store for the persisted slice.
    #[must_use]
    pub fn store(mut self, store: Arc<StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Stable row identity. Without one, rows are keyed by position and the
    /// selection is cleared whenever the rows are replaced.
    #[must_use]
    pub fn row_key(mut self, f: impl Fn(&Row, usize) -> RowKey + Send + Sync + 'static) -> Self {
        self.row_key = Some(Arc::new(f));
        self
    }

    /// Mount now.
    pub fn build(self) -> Result<TableEngine, ColumnError> {
        self.build_at(Instant::now())
    }

    /// Mount at `now`.
    pub fn build_at(self, now: Instant) -> Result<TableEngine, ColumnError> {
        let columns = ColumnSet::new(self.columns)?;
        let key = StateKey::table(&self.name);

        let mut state = self.initial_state.unwrap_or_else(|| ViewState {
            page_size: self.config.default_page_size,
            ..ViewState::default()
        });

        if let Some(store) = &self.store {
            let snapshot: Option<PersistedViewState> = store.get(&key.canonical(), None);
            match snapshot {
                Some(snapshot) => {
                    tracing::debug!(table = %self.name, "restoring persisted view state");
                    snapshot.apply_to(&mut state);
                }
                None => tracing::debug!(table = %self.name, "no persisted view state"),
            }
        }

        sanitize(&columns, &mut state);
        apply_default_sort(&columns, &mut state);

        let prepared = prepare_rows(&self.rows, &columns, self.row_key.as_ref());
        let mut engine = TableEngine {
            key,
            name: self.name,
            columns,
            rows: self.rows,
            prepared,
            row_key: self.row_key,
            state,
            persist: Debouncer::new(self.config.debounce),
            config: self.config,
            store: self.store,
            last_pushed: None,
            manual_page_count: None,
            projection: Projection::default(),
            group_keys: HashSet::new(),
            revision: 0,
        };
        engine.recompute(Outcome::Recompute);
        engine.schedule_persist(now);
        tracing::debug!(
            table = %engine.name,
            rows = engine.rows.len(),
            columns = engine.columns.len(),
            "table mounted"
        );
        Ok(engine)
    }
}

/// One mounted table.
pub struct TableEngine {
    name: String,
    key: StateKey,
    columns: ColumnSet,
    rows: Vec<Row>,
    prepared: Vec<PreparedRow>,
    row_key: Option<RowKeyFn>,
    state: ViewState,
    config: EngineConfig,
    store: Option<Arc<StateStore>>,
    persist: Debouncer<PersistedViewState>,
    last_pushed: Option<PersistedViewState>,
    manual_page_count: Option<usize>,
    projection: Projection,
    group_keys: HashSet<RowKey>,
    revision: u64,
}

impl fmt::Debug for TableEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableEngine")
            .field("name", &self.name)
            .field("rows", &self.rows.len())
            .field("columns", &self.columns.len())
            .field("state", &self.state)
            .field("revision", &self.revision)
            .field("pending_write", &self.persist.has_pending())
            .finish()
    }
}

impl TableEngine {
    /// Start building a table named `name` (unique per store).
    #[must_use]
    pub fn builder(name: impl Into<String>, columns: Vec<Column>) -> TableEngineBuilder {
        TableEngineBuilder {
            name: name.into(),
            columns,
            rows: Vec::new(),
            initial_state: None,
            config: EngineConfig::default(),
            store: None,
            row_key: None,
        }
    }

    // ── reads ──────────────────────────────────────────────────────────

    /// Table identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current view state.
    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Current projection.
    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Incremented on every applied action.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Column set.
    #[must_use]
    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Input rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.projection.page_count
    }

    /// Whether `next_page` would move.
    #[must_use]
    pub fn can_next_page(&self) -> bool {
        self.state.page_index + 1 < self.projection.page_count
    }

    /// Whether `previous_page` would move.
    #[must_use]
    pub fn can_previous_page(&self) -> bool {
        self.state.page_index > 0
    }

    /// Whether every row is selected.
    #[must_use]
    pub fn all_rows_selected(&self) -> bool {
        !self.prepared.is_empty()
            && self
                .prepared
                .iter()
                .all(|r| self.state.selected_row_keys.contains(&r.key))
    }

    /// Input rows currently selected.
    pub fn selected_rows(&self) -> impl Iterator<Item = &Row> {
        self.prepared
            .iter()
            .filter(|r| self.state.selected_row_keys.contains(&r.key))
            .map(|r| &self.rows[r.index])
    }

    // ── dispatch ───────────────────────────────────────────────────────

    /// Apply `action` now. Returns whether anything changed.
    pub fn dispatch(&mut self, action: TableAction) -> bool {
        self.dispatch_at(action, Instant::now())
    }

    /// Apply `action` at `now`. Returns whether anything changed.
    pub fn dispatch_at(&mut self, action: TableAction, now: Instant) -> bool {
        let name = action.name();
        let outcome = self.apply(action);
        if outcome == Outcome::Ignored {
            tracing::debug!(table = %self.name, action = name, "action ignored");
            return false;
        }
        tracing::debug!(table = %self.name, action = name, "action applied");
        self.recompute(outcome);
        self.revision += 1;
        self.schedule_persist(now);
        true
    }

    /// Apply a batch with a single recomputation.
    pub fn dispatch_all(&mut self, actions: impl IntoIterator<Item = TableAction>) -> bool {
        self.dispatch_all_at(actions, Instant::now())
    }

    /// Apply a batch at `now` with a single recomputation.
    ///
    /// Page actions in the batch see the page count of the last
    /// recomputation, so a batch that changes row counts should end with its
    /// page moves.
    pub fn dispatch_all_at(
        &mut self,
        actions: impl IntoIterator<Item = TableAction>,
        now: Instant,
    ) -> bool {
        let mut combined = Outcome::Ignored;
        for action in actions {
            let name = action.name();
            match self.apply(action) {
                Outcome::Ignored => {
                    tracing::debug!(table = %self.name, action = name, "action ignored");
                }
                Outcome::Recompute => {
                    if combined == Outcome::Ignored {
                        combined = Outcome::Recompute;
                    }
                }
                Outcome::RecomputeResetPage => combined = Outcome::RecomputeResetPage,
            }
        }
        if combined == Outcome::Ignored {
            return false;
        }
        self.recompute(combined);
        self.revision += 1;
        self.schedule_persist(now);
        true
    }

    fn apply(&mut self, action: TableAction) -> Outcome {
        match action {
            TableAction::SetRows(rows) => self.apply_set_rows(rows),
            TableAction::SetSort(id) => self.apply_set_sort(&id),
            TableAction::ToggleGroup(id) => self.apply_toggle_group(&id),
            TableAction::ToggleColumnVisibility(id) => self.apply_toggle_visibility(&id),
            TableAction::ReorderColumns(order) => {
                let order = normalize_order(&self.columns, &order);
                if order == self.state.column_order {
                    return Outcome::Ignored;
                }
                self.state.column_order = order;
                Outcome::Recompute
            }
            TableAction::ResizeColumn { id, delta } => self.apply_resize(&id, delta),
            TableAction::SetFilter { id, value } => self.apply_set_filter(id, value),
            TableAction::ClearFilters => {
                if self.state.filters.is_empty() {
                    return Outcome::Ignored;
                }
                self.state.filters.clear();
                Outcome::RecomputeResetPage
            }
            TableAction::GotoPage(index) => self.move_to_page(clamp_page(index, self.page_count())),
            TableAction::NextPage => {
                if !self.can_next_page() {
                    return Outcome::Ignored;
                }
                self.move_to_page(self.state.page_index + 1)
            }
            TableAction::PreviousPage => {
                if !self.can_previous_page() {
                    return Outcome::Ignored;
                }
                self.move_to_page(self.state.page_index - 1)
            }
            TableAction::SetPageSize(size) => {
                let size = size.max(1);
                if size == self.state.page_size {
                    return Outcome::Ignored;
                }
                let top_row = self.state.page_index * self.state.page_size;
                self.state.page_size = size;
                self.state.page_index = top_row / size;
                Outcome::Recompute
            }
            TableAction::SetPageCount(count) => {
                if !self.config.manual_pagination || self.manual_page_count == Some(count) {
                    return Outcome::Ignored;
                }
                self.manual_page_count = Some(count);
                Outcome::Recompute
            }
            TableAction::ToggleRowSelection(key) => {
                if !self.prepared.iter().any(|r| r.key == key) {
                    return Outcome::Ignored;
                }
                if !self.state.selected_row_keys.remove(&key) {
                    self.state.selected_row_keys.insert(key);
                }
                Outcome::Recompute
            }
            TableAction::ToggleAllRowsSelected => {
                if self.prepared.is_empty() {
                    return Outcome::Ignored;
                }
                if self.all_rows_selected() {
                    self.state.selected_row_keys.clear();
                } else {
                    self.state.selected_row_keys =
                        self.prepared.iter().map(|r| r.key.clone()).collect();
                }
                Outcome::Recompute
            }
            TableAction::ToggleRowExpanded(key) => {
                if !self.group_keys.contains(&key) {
                    return Outcome::Ignored;
                }
                if !self.state.expanded.remove(&key) {
                    self.state.expanded.insert(key);
                }
                Outcome::Recompute
            }
        }
    }

    fn apply_set_rows(&mut self, rows: Vec<Row>) -> Outcome {
        self.rows = rows;
        self.prepared = prepare_rows(&self.rows, &self.columns, self.row_key.as_ref());
        if self.row_key.is_some() {
            let present: HashSet<&RowKey> = self.prepared.iter().map(|r| &r.key).collect();
            self.state.selected_row_keys.retain(|k| present.contains(k));
        } else {
            self.state.selected_row_keys.clear();
        }
        Outcome::Recompute
    }

    fn apply_set_sort(&mut self, id: &str) -> Outcome {
        if !self.has_capability(id, ColumnFlags::SORTABLE) {
            return Outcome::Ignored;
        }
        match self.state.sort_by.first_mut() {
            Some(rule) if rule.id == id => rule.desc = !rule.desc,
            _ => self.state.sort_by = vec![SortRule::asc(id)],
        }
        Outcome::Recompute
    }

    fn apply_toggle_group(&mut self, id: &str) -> Outcome {
        if !self.has_capability(id, ColumnFlags::GROUPABLE) {
            return Outcome::Ignored;
        }
        if let Some(pos) = self.state.group_by.iter().position(|g| g == id) {
            self.state.group_by.remove(pos);
        } else {
            self.state.group_by.push(id.to_string());
        }
        self.state.expanded.clear();
        Outcome::RecomputeResetPage
    }

    fn apply_toggle_visibility(&mut self, id: &str) -> Outcome {
        let targets: Vec<String> = match self.columns.header_group(id) {
            Some(group) => group
                .children()
                .iter()
                .filter(|c| c.flags().contains(ColumnFlags::HIDEABLE))
                .map(|c| c.column_id().to_string())
                .collect(),
            None if self.has_capability(id, ColumnFlags::HIDEABLE) => vec![id.to_string()],
            None => Vec::new(),
        };
        if targets.is_empty() {
            return Outcome::Ignored;
        }
        let all_hidden = targets.iter().all(|t| self.state.is_hidden(t));
        for target in targets {
            if all_hidden {
                self.state.hidden_columns.remove(&target);
            } else {
                self.state.hidden_columns.insert(target);
            }
        }
        Outcome::Recompute
    }

    fn apply_resize(&mut self, id: &str, delta: i32) -> Outcome {
        let Some(column) = self.columns.leaf(id) else {
            return Outcome::Ignored;
        };
        if !column.flags().contains(ColumnFlags::RESIZABLE) {
            return Outcome::Ignored;
        }
        let current = column_width(column, &self.state);
        let width = column.width_bounds().clamp(i64::from(current) + i64::from(delta));
        if width == current {
            return Outcome::Ignored;
        }
        self.state.column_widths.insert(id.to_string(), width);
        Outcome::Recompute
    }

    fn apply_set_filter(&mut self, id: String, value: Option<FilterValue>) -> Outcome {
        if !self.has_capability(&id, ColumnFlags::FILTERABLE) {
            return Outcome::Ignored;
        }
        let changed = match value.filter(|v| !v.is_empty()) {
            Some(value) => self.state.filters.insert(id, value.clone()).as_ref() != Some(&value),
            None => self.state.filters.remove(&id).is_some(),
        };
        if changed {
            Outcome::RecomputeResetPage
        } else {
            Outcome::Ignored
        }
    }

    fn move_to_page(&mut self, index: usize) -> Outcome {
        if index == self.state.page_index {
            return Outcome::Ignored;
        }
        self.state.page_index = index;
        Outcome::Recompute
    }

    fn has_capability(&self, id: &str, flag: ColumnFlags) -> bool {
        self.columns
            .leaf(id)
            .is_some_and(|c| c.flags().contains(flag))
    }

    fn recompute(&mut self, outcome: Outcome) {
        let span = tracing::debug_span!("recompute", table = %self.name, rows = self.prepared.len());
        let _guard = span.enter();
        let manual = self
            .config
            .manual_pagination
            .then_some(self.manual_page_count)
            .flatten();
        let (projection, keys) = project(
            &self.columns,
            &self.prepared,
            &mut self.state,
            self.config.manual_pagination,
            manual,
            outcome == Outcome::RecomputeResetPage,
        );
        self.projection = projection;
        self.group_keys = keys;
    }

    // ── persistence ────────────────────────────────────────────────────

    fn schedule_persist(&mut self, now: Instant) {
        if !self.config.persist || self.store.is_none() {
            return;
        }
        let snapshot = PersistedViewState::capture(&self.state);
        if self.last_pushed.as_ref() == Some(&snapshot) {
            return;
        }
        self.last_pushed = Some(snapshot.clone());
        self.persist.push_at(snapshot, now);
    }

    /// Write the pending snapshot once its quiet window has elapsed.
    /// Returns whether a write happened.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    /// [`tick`](Self::tick) at `now`.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        match self.persist.poll_at(now) {
            Some(snapshot) => {
                self.write(&snapshot);
                true
            }
            None => false,
        }
    }

    /// Time until the pending write is due, `None` when nothing is pending.
    #[must_use]
    pub fn time_until_persist(&self, now: Instant) -> Option<Duration> {
        self.persist.time_until_flush(now)
    }

    /// Whether a write is pending.
    #[must_use]
    pub fn has_pending_persist(&self) -> bool {
        self.persist.has_pending()
    }

    /// Write the pending snapshot immediately. Returns whether one was
    /// pending.
    pub fn persist_now(&mut self) -> bool {
        match self.persist.flush() {
            Some(snapshot) => {
                self.write(&snapshot);
                true
            }
            None => false,
        }
    }

    fn write(&self, snapshot: &PersistedViewState) {
        if let Some(store) = &self.store {
            tracing::debug!(table = %self.name, key = %self.key, "persisting view state");
            store.set(&self.key.canonical(), snapshot);
        }
    }

    /// Tear the table down, cancelling any pending write. The cancelled
    /// snapshot is returned.
    pub fn unmount(mut self) -> Option<PersistedViewState> {
        let pending = self.persist.cancel();
        tracing::debug!(
            table = %self.name,
            cancelled_write = pending.is_some(),
            "table unmounted"
        );
        pending
    }

    // ── convenience ────────────────────────────────────────────────────

    pub fn set_rows(&mut self, rows: Vec<Row>) -> bool {
        self.dispatch(TableAction::SetRows(rows))
    }

    pub fn set_sort(&mut self, id: &str) -> bool {
        self.dispatch(TableAction::SetSort(id.to_string()))
    }

    pub fn toggle_group(&mut self, id: &str) -> bool {
        self.dispatch(TableAction::ToggleGroup(id.to_string()))
    }

    pub fn toggle_column_visibility(&mut self, id: &str) -> bool {
        self.dispatch(TableAction::ToggleColumnVisibility(id.to_string()))
    }

    pub fn reorder_columns<S: Into<String>>(&mut self, order: impl IntoIterator<Item = S>) -> bool {
        self.dispatch(TableAction::ReorderColumns(
            order.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn resize_column(&mut self, id: &str, delta: i32) -> bool {
        self.dispatch(TableAction::ResizeColumn {
            id: id.to_string(),
            delta,
        })
    }

    pub fn set_filter(&mut self, id: &str, value: impl Into<FilterValue>) -> bool {
        self.dispatch(TableAction::SetFilter {
            id: id.to_string(),
            value: Some(value.into()),
        })
    }

    pub fn clear_filter(&mut self, id: &str) -> bool {
        self.dispatch(TableAction::SetFilter {
            id: id.to_string(),
            value: None,
        })
    }

    pub fn clear_filters(&mut self) -> bool {
        self.dispatch(TableAction::ClearFilters)
    }

    pub fn goto_page(&mut self, index: i64) -> bool {
        self.dispatch(TableAction::GotoPage(index))
    }

    pub fn next_page(&mut self) -> bool {
        self.dispatch(TableAction::NextPage)
    }

    pub fn previous_page(&mut self) -> bool {
        self.dispatch(TableAction::PreviousPage)
    }

    pub fn set_page_size(&mut self, size: usize) -> bool {
        self.dispatch(TableAction::SetPageSize(size))
    }

    pub fn set_page_count(&mut self, count: usize) -> bool {
        self.dispatch(TableAction::SetPageCount(count))
    }

    pub fn toggle_row_selection(&mut self, key: impl Into<RowKey>) -> bool {
        self.dispatch(TableAction::ToggleRowSelection(key.into()))
    }

    pub fn toggle_all_rows_selected(&mut self) -> bool {
        self.dispatch(TableAction::ToggleAllRowsSelected)
    }

    pub fn toggle_row_expanded(&mut self, key: impl Into<RowKey>) -> bool {
        self.dispatch(TableAction::ToggleRowExpanded(key.into()))
    }
}

impl Stateful for TableEngine {
    type State = PersistedViewState;

    fn state_key(&self) -> StateKey {
        self.key.clone()
    }

    fn save_state(&self) -> PersistedViewState {
        PersistedViewState::capture(&self.state)
    }

    fn restore_state(&mut self, state: PersistedViewState) {
        state.apply_to(&mut self.state);
        sanitize(&self.columns, &mut self.state);
        apply_default_sort(&self.columns, &mut self.state);
        self.recompute(Outcome::Recompute);
        self.revision += 1;
    }
}

/// Drop ids that name no column with the needed capability, and clamp sizes.
fn sanitize(columns: &ColumnSet, state: &mut ViewState) {
    let capable = |id: &str, flag: ColumnFlags| {
        columns
            .leaf(id)
            .is_some_and(|c| c.flags().contains(flag))
    };

    state.sort_by.retain(|r| capable(&r.id, ColumnFlags::SORTABLE));
    state.sort_by.truncate(1);

    let before = state.filters.len();
    state
        .filters
        .retain(|id, v| capable(id, ColumnFlags::FILTERABLE) && !v.is_empty());
    if state.filters.len() != before {
        tracing::debug!(dropped = before - state.filters.len(), "dropped unusable filters");
    }

    let mut seen = HashSet::new();
    state
        .group_by
        .retain(|id| capable(id, ColumnFlags::GROUPABLE) && seen.insert(id.clone()));

    state
        .hidden_columns
        .retain(|id| capable(id, ColumnFlags::HIDEABLE));

    if !state.column_order.is_empty() {
        state.column_order = normalize_order(columns, &state.column_order);
    }

    state.column_widths.retain(|id, _| columns.contains(id));
    for (id, width) in state.column_widths.iter_mut() {
        if let Some(column) = columns.leaf(id) {
            *width = column.width_bounds().clamp(i64::from(*width));
        }
    }

    state.page_size = state.page_size.max(1);
}

/// Sort by the first definition when no sort survived the merge.
fn apply_default_sort(columns: &ColumnSet, state: &mut ViewState) {
    if !state.sort_by.is_empty() {
        return;
    }
    if let Some(id) = columns.default_sort_id() {
        tracing::debug!(column = id, "applying default sort");
        state.sort_by.push(SortRule::asc(id));
    }
}

/// Known ids of `order` (first occurrence), then the rest in definition
/// order.
fn normalize_order(columns: &ColumnSet, order: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(columns.len());
    for id in order {
        if columns.contains(id) && !out.contains(id) {
            out.push(id.clone());
        }
    }
    for id in columns.leaf_ids() {
        if !out.iter().any(|o| o == id) {
            out.push(id.to_string());
        }
    }
    out
}

/// Run the pipeline over `prepared`, correct the page index and build the
/// projection.
fn project(
    columns: &ColumnSet,
    prepared: &[PreparedRow],
    state: &mut ViewState,
    manual_pagination: bool,
    manual_page_count: Option<usize>,
    reset_page: bool,
) -> (Projection, HashSet<RowKey>) {
    let filtered = filter_rows(prepared, columns, &state.filters);
    let filtered_row_count = filtered.len();
    let mut nodes = group_rows(prepared, filtered, columns, &state.group_by);
    sort_rows(prepared, &mut nodes, &state.sort_by);
    let keys: HashSet<RowKey> = group_keys(&nodes).into_iter().collect();
    state.expanded.retain(|k| keys.contains(k));
    let flat = expand_rows(&nodes, &state.expanded);

    let pages = if manual_pagination {
        manual_page_count.unwrap_or_else(|| usize::from(!flat.is_empty()))
    } else {
        page_count(flat.len(), state.page_size)
    };
    if state.page_index >= pages.max(1) {
        let corrected = if reset_page { 0 } else { pages.saturating_sub(1) };
        tracing::debug!(
            from = state.page_index,
            to = corrected,
            page_count = pages,
            "page index out of range"
        );
        state.page_index = corrected;
    }

    let page_slice = if manual_pagination {
        &flat[..]
    } else {
        let start = (state.page_index * state.page_size).min(flat.len());
        let end = (start + state.page_size).min(flat.len());
        &flat[start..end]
    };

    let visible = visible_columns(columns, state);
    let page = page_slice
        .iter()
        .map(|f| project_row(f, prepared, &visible, state))
        .collect();

    let projection = Projection {
        header_groups: header_groups(columns, &visible, state),
        visible_columns: visible.iter().map(|c| c.column_id().to_string()).collect(),
        page,
        page_index: state.page_index,
        page_count: pages,
        row_count: flat.len(),
        filtered_row_count,
        total_row_count: prepared.len(),
    };
    (projection, keys)
}
