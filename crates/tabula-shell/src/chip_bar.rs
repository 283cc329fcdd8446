//! Active-filter chips.

use tabula_engine::{ColumnSet, ViewState};

/// One dismissible chip describing an active filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChip {
    pub column_id: String,
    /// Header label of the filtered column.
    pub label: String,
    /// Filter value as shown to the user.
    pub text: String,
}

impl FilterChip {
    /// `Label: text`.
    #[must_use]
    pub fn caption(&self) -> String {
        format!("{}: {}", self.label, self.text)
    }
}

/// Chip bar view model; empty when nothing is filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChipBar {
    pub chips: Vec<FilterChip>,
}

impl ChipBar {
    /// One chip per non-empty filter, in column-id order.
    #[must_use]
    pub fn build(columns: &ColumnSet, state: &ViewState) -> Self {
        let chips = state
            .filters
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(id, value)| FilterChip {
                column_id: id.clone(),
                label: columns
                    .leaf(id)
                    .map_or_else(|| id.clone(), |c| c.header_label().to_string()),
                text: value.describe(),
            })
            .collect();
        Self { chips }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_engine::{Column, FilterStrategy, FilterValue};

    #[test]
    fn one_chip_per_filter() {
        let columns = ColumnSet::new(vec![
            Column::new("name").header("System"),
            Column::new("age").header("Age").filter(FilterStrategy::Numeric),
        ])
        .unwrap();
        let state = ViewState::default()
            .with_filter("name", "ech")
            .with_filter("age", FilterValue::range(Some(0.0), Some(5.0)));
        let bar = ChipBar::build(&columns, &state);
        let captions: Vec<_> = bar.chips.iter().map(FilterChip::caption).collect();
        assert_eq!(captions, ["Age: 0–5", "System: ech"]);
    }

    #[test]
    fn empty_without_filters() {
        let columns = ColumnSet::new(vec![Column::new("name")]).unwrap();
        assert!(ChipBar::build(&columns, &ViewState::default()).is_empty());
    }
}
