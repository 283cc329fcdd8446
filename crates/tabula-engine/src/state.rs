//! View state and its persisted slice.
//!
//! [`ViewState`] is everything the user controls. [`PersistedViewState`] is
//! the part that survives sessions; it is written as camelCase JSON and read
//! back field by field so one malformed field never discards the others.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::filter::FilterValue;
use crate::row::RowKey;

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Direction of a sort rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// The opposite direction.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// One entry of `sortBy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortRule {
    pub id: String,
    #[serde(default)]
    pub desc: bool,
}

impl SortRule {
    /// Ascending rule on `id`.
    #[must_use]
    pub fn asc(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            desc: false,
        }
    }

    /// Descending rule on `id`.
    #[must_use]
    pub fn desc(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            desc: true,
        }
    }

    /// Rule direction.
    #[must_use]
    pub fn direction(&self) -> SortDirection {
        if self.desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }
}

/// User-controlled table parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewState {
    pub sort_by: Vec<SortRule>,
    pub filters: BTreeMap<String, FilterValue>,
    pub group_by: Vec<String>,
    pub expanded: BTreeSet<RowKey>,
    pub page_index: usize,
    pub page_size: usize,
    pub hidden_columns: BTreeSet<String>,
    pub column_order: Vec<String>,
    pub column_widths: BTreeMap<String, u32>,
    pub selected_row_keys: BTreeSet<RowKey>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            sort_by: Vec::new(),
            filters: BTreeMap::new(),
            group_by: Vec::new(),
            expanded: BTreeSet::new(),
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            hidden_columns: BTreeSet::new(),
            column_order: Vec::new(),
            column_widths: BTreeMap::new(),
            selected_row_keys: BTreeSet::new(),
        }
    }
}

impl ViewState {
    /// Builder: sort rules.
    #[must_use]
    pub fn with_sort(mut self, sort_by: impl IntoIterator<Item = SortRule>) -> Self {
        self.sort_by = sort_by.into_iter().collect();
        self
    }

    /// Builder: one filter.
    #[must_use]
    pub fn with_filter(mut self, id: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(id.into(), value.into());
        self
    }

    /// Builder: page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Builder: hidden columns.
    #[must_use]
    pub fn with_hidden(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.hidden_columns = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: grouping.
    #[must_use]
    pub fn with_group_by(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_by = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Active sort rule for `id`.
    #[must_use]
    pub fn sort_for(&self, id: &str) -> Option<&SortRule> {
        self.sort_by.iter().find(|r| r.id == id)
    }

    /// Whether `id` is grouped.
    #[must_use]
    pub fn is_grouped(&self, id: &str) -> bool {
        self.group_by.iter().any(|g| g == id)
    }

    /// Whether `id` is hidden.
    #[must_use]
    pub fn is_hidden(&self, id: &str) -> bool {
        self.hidden_columns.contains(id)
    }
}

/// The slice of [`ViewState`] that is persisted.
///
/// Every field is optional: an absent field leaves the corresponding view
/// state untouched when applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedViewState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<Vec<SortRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<BTreeMap<String, FilterValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_widths: Option<BTreeMap<String, u32>>,
}

impl PersistedViewState {
    /// Capture the persisted slice of `state`.
    #[must_use]
    pub fn capture(state: &ViewState) -> Self {
        Self {
            sort_by: Some(state.sort_by.clone()),
            filters: Some(state.filters.clone()),
            page_size: Some(state.page_size),
            hidden_columns: Some(state.hidden_columns.iter().cloned().collect()),
            column_order: Some(state.column_order.clone()),
            column_widths: Some(state.column_widths.clone()),
        }
    }

    /// Overwrite the fields of `state` this snapshot carries.
    pub fn apply_to(&self, state: &mut ViewState) {
        if let Some(sort_by) = &self.sort_by {
            state.sort_by = sort_by.clone();
        }
        if let Some(filters) = &self.filters {
            state.filters = filters.clone();
        }
        if let Some(page_size) = self.page_size {
            state.page_size = page_size;
        }
        if let Some(hidden) = &self.hidden_columns {
            state.hidden_columns = hidden.iter().cloned().collect();
        }
        if let Some(order) = &self.column_order {
            state.column_order = order.clone();
        }
        if let Some(widths) = &self.column_widths {
            state.column_widths = widths.clone();
        }
    }

    /// Whether no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Decode `value`, keeping every field that parses and dropping the
    /// rest.
    ///
    /// `filters` is accepted either as an object keyed by column id or as
    /// an array of `{ "id": .., "value": .. }` entries.
    #[must_use]
    pub fn from_json_lenient(value: &Value) -> Self {
        let Value::Object(map) = value else {
            if !value.is_null() {
                tracing::warn!(kind = json_kind(value), "persisted view state is not an object");
            }
            return Self::default();
        };

        let mut out = Self {
            sort_by: field(map.get("sortBy"), "sortBy"),
            filters: map.get("filters").and_then(decode_filters),
            page_size: field::<usize>(map.get("pageSize"), "pageSize").filter(|&n| n > 0),
            hidden_columns: field(map.get("hiddenColumns"), "hiddenColumns"),
            column_order: field(map.get("columnOrder"), "columnOrder"),
            column_widths: field(map.get("columnWidths"), "columnWidths"),
        };
        if let Some(sort_by) = &mut out.sort_by {
            sort_by.retain(|r| !r.id.is_empty());
        }
        out
    }
}

impl<'de> Deserialize<'de> for PersistedViewState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json_lenient(&value))
    }
}

fn field<T: serde::de::DeserializeOwned>(value: Option<&Value>, name: &str) -> Option<T> {
    let value = value?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(field = name, error = %err, "ignoring malformed persisted field");
            None
        }
    }
}

fn decode_filters(value: &Value) -> Option<BTreeMap<String, FilterValue>> {
    let entries: BTreeMap<String, FilterValue> = match value {
        Value::Object(map) => map
            .iter()
            .map(|(id, v)| (id.clone(), FilterValue(v.clone())))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let id = item.get("id")?.as_str()?;
                let v = item.get("value").cloned().unwrap_or(Value::Null);
                Some((id.to_string(), FilterValue(v)))
            })
            .collect(),
        Value::Null => return None,
        other => {
            tracing::warn!(kind = json_kind(other), "ignoring malformed persisted filters");
            return None;
        }
    };
    Some(entries.into_iter().filter(|(_, v)| !v.is_empty()).collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_page_size() {
        assert_eq!(ViewState::default().page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn capture_serializes_camel_case() {
        let state = ViewState::default()
            .with_sort([SortRule::desc("name")])
            .with_filter("age", FilterValue::range(Some(0.0), Some(5.0)))
            .with_hidden(["namespace"]);
        let json = serde_json::to_value(PersistedViewState::capture(&state)).unwrap();
        assert_eq!(
            json,
            json!({
                "sortBy": [{"id": "name", "desc": true}],
                "filters": {"age": [0.0, 5.0]},
                "pageSize": 10,
                "hiddenColumns": ["namespace"],
                "columnOrder": [],
                "columnWidths": {}
            })
        );
    }

    #[test]
    fn lenient_decode_keeps_good_fields() {
        let snapshot = PersistedViewState::from_json_lenient(&json!({
            "sortBy": "broken",
            "pageSize": 25,
            "hiddenColumns": ["a", 3],
            "filters": [{"id": "name", "value": "echo"}, {"id": "age", "value": null}]
        }));
        assert_eq!(snapshot.sort_by, None);
        assert_eq!(snapshot.page_size, Some(25));
        assert_eq!(snapshot.hidden_columns, None);
        let filters = snapshot.filters.unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters["name"], FilterValue::text("echo"));
    }

    #[test]
    fn lenient_decode_rejects_zero_page_size_and_non_objects() {
        let snapshot = PersistedViewState::from_json_lenient(&json!({"pageSize": 0}));
        assert_eq!(snapshot.page_size, None);
        assert!(PersistedViewState::from_json_lenient(&json!([1, 2])).is_empty());
    }

    #[test]
    fn sort_rule_without_desc_is_ascending() {
        let snapshot = PersistedViewState::from_json_lenient(&json!({"sortBy": [{"id": "name"}]}));
        assert_eq!(snapshot.sort_by, Some(vec![SortRule::asc("name")]));
    }

    #[test]
    fn deserialize_goes_through_lenient_path() {
        let snapshot: PersistedViewState =
            serde_json::from_str(r#"{"pageSize":"ten","columnWidths":{"name":200}}"#).unwrap();
        assert_eq!(snapshot.page_size, None);
        assert_eq!(snapshot.column_widths.unwrap()["name"], 200);
    }

    #[test]
    fn apply_only_present_fields() {
        let mut state = ViewState::default().with_page_size(25).with_hidden(["x"]);
        PersistedViewState {
            sort_by: Some(vec![SortRule::asc("age")]),
            ..Default::default()
        }
        .apply_to(&mut state);
        assert_eq!(state.sort_by, vec![SortRule::asc("age")]);
        assert_eq!(state.page_size, 25);
        assert!(state.is_hidden("x"));
    }
}
