//! The derived, render-ready view: header rows, the visible page and page
//! counts. Rebuilt on every change and never persisted.

use serde_json::Value;

use crate::column::{Align, Column, ColumnFlags, ColumnSet};
use crate::pipeline::{FlatRow, PreparedRow};
use crate::row::RowKey;
use crate::state::{SortDirection, ViewState};

/// One header cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Column id, or header group id.
    pub id: String,
    pub label: String,
    /// Header row index, 0 for the top row.
    pub depth: usize,
    /// Number of leaf columns spanned.
    pub col_span: usize,
    /// Filler above a column that has no header group.
    pub is_placeholder: bool,
    /// Leaf column ids beneath this header.
    pub column_ids: Vec<String>,
    pub can_sort: bool,
    pub sort: Option<SortDirection>,
    pub can_group: bool,
    pub is_grouped: bool,
    pub can_resize: bool,
    /// Width in pixels (sum of spanned columns).
    pub width: u32,
    pub align: Align,
}

/// One row of headers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeaderGroup {
    pub headers: Vec<Header>,
}

/// How a cell renders.
#[derive(Debug, Clone, PartialEq)]
pub enum CellKind {
    /// The row's own value.
    Plain(Value),
    /// The grouped column of a group row, with its expand affordance.
    Grouped {
        value: Value,
        sub_row_count: usize,
        expanded: bool,
    },
    /// An aggregate over the group's rows.
    Aggregated(Value),
    /// A grouped column on a row that is not grouped by it. Renders empty.
    Placeholder,
}

/// One cell of a projected row.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub column_id: String,
    pub kind: CellKind,
}

/// A row of the visible page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow {
    pub key: RowKey,
    /// Input position for leaf rows.
    pub index: Option<usize>,
    pub depth: usize,
    pub is_group: bool,
    /// Direct children of a group row.
    pub sub_row_count: usize,
    pub expanded: bool,
    pub selected: bool,
    pub cells: Vec<Cell>,
}

impl ProjectedRow {
    /// Cell of `column_id`.
    #[must_use]
    pub fn cell(&self, column_id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.column_id == column_id)
    }
}

/// Render-ready view of the table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    pub header_groups: Vec<HeaderGroup>,
    /// Visible leaf column ids in render order.
    pub visible_columns: Vec<String>,
    pub page: Vec<ProjectedRow>,
    pub page_index: usize,
    pub page_count: usize,
    /// Rows (group and expanded leaf rows) that pagination runs over.
    pub row_count: usize,
    /// Leaf rows passing the filters.
    pub filtered_row_count: usize,
    /// Leaf rows before filtering.
    pub total_row_count: usize,
}

impl Projection {
    /// Whether there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }
}

/// Visible leaf columns in render order.
///
/// `column_order` first (unknown ids skipped), then the remaining columns in
/// definition order; grouped columns move to the front in `group_by` order;
/// hidden columns are dropped.
pub fn visible_columns<'a>(columns: &'a ColumnSet, state: &ViewState) -> Vec<&'a Column> {
    let mut ordered: Vec<&Column> = Vec::with_capacity(columns.len());
    for id in &state.column_order {
        if let Some(column) = columns.leaf(id) {
            if !ordered.iter().any(|c| c.column_id() == id) {
                ordered.push(column);
            }
        }
    }
    for column in columns.leaves() {
        if !ordered.iter().any(|c| c.column_id() == column.column_id()) {
            ordered.push(column);
        }
    }

    let mut out: Vec<&Column> = state
        .group_by
        .iter()
        .filter_map(|id| ordered.iter().copied().find(|c| c.column_id() == id))
        .collect();
    out.extend(ordered.into_iter().filter(|c| !state.is_grouped(c.column_id())));
    out.retain(|c| !state.is_hidden(c.column_id()));
    out
}

/// Effective width of `column`.
#[must_use]
pub fn column_width(column: &Column, state: &ViewState) -> u32 {
    let bounds = column.width_bounds();
    let width = state
        .column_widths
        .get(column.column_id())
        .copied()
        .unwrap_or(bounds.width);
    bounds.clamp(i64::from(width))
}

fn leaf_header(column: &Column, state: &ViewState, depth: usize) -> Header {
    let id = column.column_id();
    let flags = column.flags();
    Header {
        id: id.to_string(),
        label: column.header_label().to_string(),
        depth,
        col_span: 1,
        is_placeholder: false,
        column_ids: vec![id.to_string()],
        can_sort: flags.contains(ColumnFlags::SORTABLE),
        sort: state.sort_for(id).map(|r| r.direction()),
        can_group: flags.contains(ColumnFlags::GROUPABLE),
        is_grouped: state.is_grouped(id),
        can_resize: flags.contains(ColumnFlags::RESIZABLE),
        width: column_width(column, state),
        align: column.alignment(),
    }
}

/// Header rows for `visible`.
///
/// With header groups present the top row merges runs of adjacent columns
/// that share a group; columns without one get a placeholder cell.
pub fn header_groups(columns: &ColumnSet, visible: &[&Column], state: &ViewState) -> Vec<HeaderGroup> {
    let depth = usize::from(columns.has_header_groups());
    let leaves = HeaderGroup {
        headers: visible.iter().map(|c| leaf_header(c, state, depth)).collect(),
    };
    if depth == 0 {
        return vec![leaves];
    }

    let mut top: Vec<Header> = Vec::new();
    for (column, leaf) in visible.iter().zip(&leaves.headers) {
        let group = columns.group_of(column.column_id());
        if let (Some(group), Some(last)) = (group, top.last_mut()) {
            if !last.is_placeholder && last.id == group.column_id() {
                last.col_span += 1;
                last.column_ids.push(leaf.id.clone());
                last.width = last.width.saturating_add(leaf.width);
                continue;
            }
        }
        top.push(match group {
            Some(group) => Header {
                id: group.column_id().to_string(),
                label: group.header_label().to_string(),
                depth: 0,
                col_span: 1,
                is_placeholder: false,
                column_ids: vec![leaf.id.clone()],
                can_sort: false,
                sort: None,
                can_group: false,
                is_grouped: false,
                can_resize: false,
                width: leaf.width,
                align: group.alignment(),
            },
            None => Header {
                id: format!("{}_placeholder", leaf.id),
                label: String::new(),
                depth: 0,
                col_span: 1,
                is_placeholder: true,
                column_ids: vec![leaf.id.clone()],
                can_sort: false,
                sort: None,
                can_group: false,
                is_grouped: false,
                can_resize: false,
                width: leaf.width,
                align: Align::Left,
            },
        });
    }
    vec![HeaderGroup { headers: top }, leaves]
}

/// Resolve one flattened row into cells over `visible`.
pub fn project_row(
    flat: &FlatRow<'_>,
    rows: &[PreparedRow],
    visible: &[&Column],
    state: &ViewState,
) -> ProjectedRow {
    match *flat {
        FlatRow::Leaf { index, depth } => {
            let row = &rows[index];
            let cells = visible
                .iter()
                .map(|column| {
                    let id = column.column_id();
                    let kind = if state.is_grouped(id) {
                        CellKind::Placeholder
                    } else {
                        CellKind::Plain(row.values.get(id).cloned().unwrap_or(Value::Null))
                    };
                    Cell {
                        column_id: id.to_string(),
                        kind,
                    }
                })
                .collect();
            ProjectedRow {
                key: row.key.clone(),
                index: Some(row.index),
                depth,
                is_group: false,
                sub_row_count: 0,
                expanded: false,
                selected: state.selected_row_keys.contains(&row.key),
                cells,
            }
        }
        FlatRow::Group { node, expanded } => {
            let cells = visible
                .iter()
                .map(|column| {
                    let id = column.column_id();
                    let kind = if id == node.column_id {
                        CellKind::Grouped {
                            value: node.value.clone(),
                            sub_row_count: node.children.len(),
                            expanded,
                        }
                    } else if state.is_grouped(id) {
                        CellKind::Placeholder
                    } else {
                        CellKind::Aggregated(node.aggregates.get(id).cloned().unwrap_or(Value::Null))
                    };
                    Cell {
                        column_id: id.to_string(),
                        kind,
                    }
                })
                .collect();
            ProjectedRow {
                key: node.key.clone(),
                index: None,
                depth: node.depth,
                is_group: true,
                sub_row_count: node.children.len(),
                expanded,
                selected: false,
                cells,
            }
        }
    }
}
