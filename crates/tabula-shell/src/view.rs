//! Render-ready view of one table.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tabula_engine::row::render_value;
use tabula_engine::{Align, CellKind, HeaderGroup, ProjectedRow, RowKey};

use crate::chip_bar::ChipBar;
use crate::pagination::PaginationView;
use crate::toolbar::Toolbar;

/// Formats a cell value for display.
pub type CellFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// One body cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellView {
    pub column_id: String,
    pub kind: CellKind,
    /// Display text: `value (n)` for grouped cells, empty for placeholders.
    pub text: String,
    pub width: u32,
    pub align: Align,
}

/// One body row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub key: RowKey,
    pub depth: usize,
    pub is_group: bool,
    pub expanded: bool,
    pub selected: bool,
    pub cells: Vec<CellView>,
}

/// Everything a renderer needs, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellView {
    pub toolbar: Toolbar,
    pub chips: ChipBar,
    pub header_content: Option<String>,
    pub head: Vec<HeaderGroup>,
    pub body: Vec<RowView>,
    /// `None` when there is nothing to paginate.
    pub pagination: Option<PaginationView>,
}

/// Resolve display text for the cells of `rows`.
pub(crate) fn body_rows(
    rows: &[ProjectedRow],
    head: &[HeaderGroup],
    formatters: &HashMap<String, CellFormatter>,
) -> Vec<RowView> {
    let layout: HashMap<&str, (u32, Align)> = head
        .last()
        .map(|leaves| {
            leaves
                .headers
                .iter()
                .map(|h| (h.id.as_str(), (h.width, h.align)))
                .collect()
        })
        .unwrap_or_default();

    let format = |id: &str, value: &Value| match formatters.get(id) {
        Some(f) => f(value),
        None => render_value(value),
    };

    rows.iter()
        .map(|row| RowView {
            key: row.key.clone(),
            depth: row.depth,
            is_group: row.is_group,
            expanded: row.expanded,
            selected: row.selected,
            cells: row
                .cells
                .iter()
                .map(|cell| {
                    let text = match &cell.kind {
                        CellKind::Grouped {
                            value,
                            sub_row_count,
                            ..
                        } => format!("{} ({sub_row_count})", format(&cell.column_id, value)),
                        CellKind::Aggregated(Value::Null) | CellKind::Placeholder => String::new(),
                        CellKind::Aggregated(value) | CellKind::Plain(value) => {
                            format(&cell.column_id, value)
                        }
                    };
                    let (width, align) = layout
                        .get(cell.column_id.as_str())
                        .copied()
                        .unwrap_or((tabula_engine::column::DEFAULT_COLUMN_WIDTH, Align::Left));
                    CellView {
                        column_id: cell.column_id.clone(),
                        kind: cell.kind.clone(),
                        text,
                        width,
                        align,
                    }
                })
                .collect(),
        })
        .collect()
}
