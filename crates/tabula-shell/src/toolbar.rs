//! Toolbar above the table: title, column-visibility toggles and a free slot.

use tabula_engine::{ColumnFlags, ColumnSet, ViewState};

/// A visibility switch for one column or one header group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityToggle {
    /// Id to pass back in [`ShellEvent::ColumnVisibilityToggled`](crate::ShellEvent).
    pub id: String,
    pub label: String,
    /// For groups: whether any member is shown.
    pub visible: bool,
    pub is_group: bool,
}

/// Toolbar view model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolbar {
    pub title: Option<String>,
    pub toggles: Vec<VisibilityToggle>,
    /// Caller content (search box, buttons), rendered after the toggles.
    pub slot: Option<String>,
}

impl Toolbar {
    /// Build toggles for every hideable top-level definition.
    #[must_use]
    pub fn build(
        columns: &ColumnSet,
        state: &ViewState,
        title: Option<&str>,
        slot: Option<&str>,
    ) -> Self {
        let hideable = |c: &tabula_engine::Column| c.flags().contains(ColumnFlags::HIDEABLE);
        let toggles = columns
            .definitions()
            .iter()
            .filter_map(|def| {
                if def.is_group() {
                    let members: Vec<_> = def.children().iter().filter(|c| hideable(c)).collect();
                    if members.is_empty() {
                        return None;
                    }
                    Some(VisibilityToggle {
                        id: def.column_id().to_string(),
                        label: def.header_label().to_string(),
                        visible: members.iter().any(|c| !state.is_hidden(c.column_id())),
                        is_group: true,
                    })
                } else if hideable(def) {
                    Some(VisibilityToggle {
                        id: def.column_id().to_string(),
                        label: def.header_label().to_string(),
                        visible: !state.is_hidden(def.column_id()),
                        is_group: false,
                    })
                } else {
                    None
                }
            })
            .collect();

        Self {
            title: title.map(str::to_string),
            toggles,
            slot: slot.map(str::to_string),
        }
    }
}
