//! User interactions forwarded from the rendered table.

use tabula_engine::{FilterValue, RowKey, TableAction};

/// One discrete interaction with a rendered table.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    /// Sort affordance of a header clicked.
    HeaderClicked(String),
    /// Group affordance of a header clicked.
    GroupToggled(String),
    /// Visibility toggle in the toolbar, by column or header-group id.
    ColumnVisibilityToggled(String),
    /// Resize handle dragged by `delta` pixels.
    ColumnResized { id: String, delta: i32 },
    /// Columns dropped into a new order.
    ColumnsReordered(Vec<String>),
    /// Filter control edited; `None` clears.
    FilterChanged {
        id: String,
        value: Option<FilterValue>,
    },
    /// Dismiss button of a filter chip.
    ChipDismissed(String),
    RowSelectionToggled(RowKey),
    AllRowsSelectionToggled,
    /// Expand/collapse affordance of a group row.
    RowExpansionToggled(RowKey),
    /// Page picked in the pagination control (0-based).
    PageRequested(usize),
    NextPageRequested,
    PreviousPageRequested,
    /// Rows-per-page selector changed.
    PageSizeSelected(usize),
}

impl ShellEvent {
    /// Engine action for events that never involve the pagination mode.
    ///
    /// Page events return `None`; the shell routes those itself.
    #[must_use]
    pub fn into_action(self) -> Option<TableAction> {
        let action = match self {
            ShellEvent::HeaderClicked(id) => TableAction::SetSort(id),
            ShellEvent::GroupToggled(id) => TableAction::ToggleGroup(id),
            ShellEvent::ColumnVisibilityToggled(id) => TableAction::ToggleColumnVisibility(id),
            ShellEvent::ColumnResized { id, delta } => TableAction::ResizeColumn { id, delta },
            ShellEvent::ColumnsReordered(order) => TableAction::ReorderColumns(order),
            ShellEvent::FilterChanged { id, value } => TableAction::SetFilter { id, value },
            ShellEvent::ChipDismissed(id) => TableAction::SetFilter { id, value: None },
            ShellEvent::RowSelectionToggled(key) => TableAction::ToggleRowSelection(key),
            ShellEvent::AllRowsSelectionToggled => TableAction::ToggleAllRowsSelected,
            ShellEvent::RowExpansionToggled(key) => TableAction::ToggleRowExpanded(key),
            ShellEvent::PageRequested(_)
            | ShellEvent::NextPageRequested
            | ShellEvent::PreviousPageRequested
            | ShellEvent::PageSizeSelected(_) => return None,
        };
        Some(action)
    }

    /// Whether the pagination control produced this event.
    #[must_use]
    pub const fn is_page_event(&self) -> bool {
        matches!(
            self,
            ShellEvent::PageRequested(_)
                | ShellEvent::NextPageRequested
                | ShellEvent::PreviousPageRequested
                | ShellEvent::PageSizeSelected(_)
        )
    }
}
