//! Column definitions and the validated, flattened column set.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;
use serde_json::Value;

use crate::filter::FilterStrategy;
use crate::row::{Row, as_f64, render_value};

/// Default column width in pixels.
pub const DEFAULT_COLUMN_WIDTH: u32 = 150;
/// Default minimum column width in pixels.
pub const DEFAULT_MIN_COLUMN_WIDTH: u32 = 30;

bitflags! {
    /// Capabilities a column exposes to the user.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColumnFlags: u8 {
        const SORTABLE   = 0b0000_0001;
        const GROUPABLE  = 0b0000_0010;
        const RESIZABLE  = 0b0000_0100;
        const HIDEABLE   = 0b0000_1000;
        const FILTERABLE = 0b0001_0000;
    }
}

impl Default for ColumnFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// Computes a cell value from a row.
pub type AccessorFn = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// How a column reads its value from a row.
#[derive(Clone)]
pub enum Accessor {
    /// Read a field by name.
    Field(String),
    /// Compute the value.
    Computed(AccessorFn),
}

impl Accessor {
    /// Evaluate against `row`. Missing fields read as `null`.
    #[must_use]
    pub fn value(&self, row: &Row) -> Value {
        match self {
            Accessor::Field(field) => row.get(field).cloned().unwrap_or(Value::Null),
            Accessor::Computed(f) => f(row),
        }
    }

    /// Field name for field accessors.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Accessor::Field(field) => Some(field),
            Accessor::Computed(_) => None,
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Field(field) => f.debug_tuple("Field").field(field).finish(),
            Accessor::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Horizontal alignment of header and cell content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Aggregate shown in a column's cell on group rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Number of leaf rows.
    Count,
    /// Sum of numeric values.
    Sum,
    /// Smallest numeric value.
    Min,
    /// Largest numeric value.
    Max,
    /// Mean of numeric values.
    Average,
    /// Number of distinct rendered values.
    UniqueCount,
}

impl Aggregation {
    /// Aggregate `values` (the leaf values beneath a group).
    #[must_use]
    pub fn apply(self, values: &[&Value]) -> Value {
        let numbers = || values.iter().filter_map(|v| as_f64(v));
        match self {
            Aggregation::Count => Value::from(values.len()),
            Aggregation::Sum => number(numbers().sum()),
            Aggregation::Min => numbers().reduce(f64::min).map_or(Value::Null, number),
            Aggregation::Max => numbers().reduce(f64::max).map_or(Value::Null, number),
            Aggregation::Average => {
                let (sum, count) = numbers().fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    Value::Null
                } else {
                    number(sum / count as f64)
                }
            }
            Aggregation::UniqueCount => {
                let distinct: HashSet<String> = values.iter().map(|v| render_value(v)).collect();
                Value::from(distinct.len())
            }
        }
    }
}

/// Integral results stay integers so they render without a trailing `.0`.
fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Aggregation::Count),
            "sum" => Ok(Aggregation::Sum),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "average" | "avg" => Ok(Aggregation::Average),
            "uniqueCount" | "unique_count" => Ok(Aggregation::UniqueCount),
            other => Err(format!("unknown aggregation: {other}")),
        }
    }
}

/// Width and its bounds, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidthBounds {
    pub width: u32,
    pub min: u32,
    pub max: Option<u32>,
}

impl Default for WidthBounds {
    fn default() -> Self {
        Self {
            width: DEFAULT_COLUMN_WIDTH,
            min: DEFAULT_MIN_COLUMN_WIDTH,
            max: None,
        }
    }
}

impl WidthBounds {
    /// Clamp `width` into `[min, max]`.
    #[must_use]
    pub fn clamp(&self, width: i64) -> u32 {
        let max = self.max.unwrap_or(u32::MAX).max(self.min);
        width.clamp(i64::from(self.min), i64::from(max)) as u32
    }
}

/// A column definition, or a header group nesting leaf columns one level deep.
#[derive(Debug, Clone)]
pub struct Column {
    id: String,
    accessor: Option<Accessor>,
    header: String,
    filter: Option<FilterStrategy>,
    flags: ColumnFlags,
    width: WidthBounds,
    align: Align,
    aggregate: Option<Aggregation>,
    columns: Vec<Column>,
}

impl Column {
    /// Leaf column reading the field named `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            accessor: Some(Accessor::Field(id.clone())),
            header: id.clone(),
            id,
            filter: None,
            flags: ColumnFlags::default(),
            width: WidthBounds::default(),
            align: Align::default(),
            aggregate: None,
            columns: Vec::new(),
        }
    }

    /// Leaf column whose value is computed from the row.
    #[must_use]
    pub fn computed(
        id: impl Into<String>,
        f: impl Fn(&Row) -> Value + Send + Sync + 'static,
    ) -> Self {
        let mut column = Self::new(id);
        column.accessor = Some(Accessor::Computed(Arc::new(f)));
        column
    }

    /// Header group. Its id defaults to the header text.
    #[must_use]
    pub fn group(header: impl Into<String>, columns: impl IntoIterator<Item = Column>) -> Self {
        let header = header.into();
        Self {
            id: header.clone(),
            accessor: None,
            header,
            filter: None,
            flags: ColumnFlags::HIDEABLE,
            width: WidthBounds::default(),
            align: Align::default(),
            aggregate: None,
            columns: columns.into_iter().collect(),
        }
    }

    /// Override the id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Read a different field than the id names.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        if !self.is_group() {
            self.accessor = Some(Accessor::Field(field.into()));
        }
        self
    }

    /// Header text.
    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Filter strategy.
    #[must_use]
    pub fn filter(mut self, strategy: FilterStrategy) -> Self {
        self.filter = Some(strategy);
        self
    }

    /// Whether the column can be sorted (default true).
    #[must_use]
    pub fn sortable(self, on: bool) -> Self {
        self.flag(ColumnFlags::SORTABLE, on)
    }

    /// Whether the column can be grouped by (default true).
    #[must_use]
    pub fn groupable(self, on: bool) -> Self {
        self.flag(ColumnFlags::GROUPABLE, on)
    }

    /// Whether the column can be resized (default true).
    #[must_use]
    pub fn resizable(self, on: bool) -> Self {
        self.flag(ColumnFlags::RESIZABLE, on)
    }

    /// Whether the column can be hidden (default true).
    #[must_use]
    pub fn hideable(self, on: bool) -> Self {
        self.flag(ColumnFlags::HIDEABLE, on)
    }

    /// Whether the column accepts filters (default true).
    #[must_use]
    pub fn filterable(self, on: bool) -> Self {
        self.flag(ColumnFlags::FILTERABLE, on)
    }

    fn flag(mut self, flag: ColumnFlags, on: bool) -> Self {
        self.flags.set(flag, on);
        self
    }

    /// Initial width.
    #[must_use]
    pub fn width(mut self, width: u32) -> Self {
        self.width.width = width;
        self
    }

    /// Minimum width.
    #[must_use]
    pub fn min_width(mut self, min: u32) -> Self {
        self.width.min = min;
        self
    }

    /// Maximum width.
    #[must_use]
    pub fn max_width(mut self, max: u32) -> Self {
        self.width.max = Some(max);
        self
    }

    /// Content alignment.
    #[must_use]
    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    /// Aggregate shown on group rows.
    #[must_use]
    pub fn aggregate(mut self, aggregation: Aggregation) -> Self {
        self.aggregate = Some(aggregation);
        self
    }

    // ── accessors ──────────────────────────────────────────────────────

    /// Column id.
    #[must_use]
    pub fn column_id(&self) -> &str {
        &self.id
    }

    /// Header text.
    #[must_use]
    pub fn header_label(&self) -> &str {
        &self.header
    }

    /// Value accessor; `None` for header groups.
    #[must_use]
    pub fn accessor(&self) -> Option<&Accessor> {
        self.accessor.as_ref()
    }

    /// Configured filter strategy.
    #[must_use]
    pub fn filter_strategy(&self) -> Option<FilterStrategy> {
        self.filter
    }

    /// Capability flags.
    #[must_use]
    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    /// Width bounds.
    #[must_use]
    pub fn width_bounds(&self) -> WidthBounds {
        self.width
    }

    /// Alignment.
    #[must_use]
    pub fn alignment(&self) -> Align {
        self.align
    }

    /// Group-row aggregate.
    #[must_use]
    pub fn aggregation(&self) -> Option<Aggregation> {
        self.aggregate
    }

    /// Nested columns of a header group.
    #[must_use]
    pub fn children(&self) -> &[Column] {
        &self.columns
    }

    /// Whether this definition is a header group.
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.accessor.is_none()
    }

    /// Id used for the synthesized default sort: the first child's for a
    /// header group, this column's otherwise.
    #[must_use]
    pub fn default_sort_id(&self) -> Option<&str> {
        if self.is_group() {
            self.columns.first().map(|c| c.id.as_str())
        } else {
            Some(&self.id)
        }
    }
}

/// Column definitions that violate the set's invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    /// Two definitions share an id.
    DuplicateId(String),
    /// A definition has an empty id.
    EmptyId,
    /// A header group nests another header group.
    NestingTooDeep(String),
    /// A header group has no columns.
    EmptyGroup(String),
}

impl fmt::Display for ColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnError::DuplicateId(id) => write!(f, "duplicate column id: {id}"),
            ColumnError::EmptyId => write!(f, "column id must not be empty"),
            ColumnError::NestingTooDeep(id) => {
                write!(f, "header group {id} nests another header group")
            }
            ColumnError::EmptyGroup(id) => write!(f, "header group {id} has no columns"),
        }
    }
}

impl std::error::Error for ColumnError {}

/// Validated definitions plus their flattened leaf columns.
#[derive(Debug, Clone)]
pub struct ColumnSet {
    definitions: Vec<Column>,
    leaves: Vec<Column>,
    /// Definition index of each leaf's header group.
    parents: Vec<Option<usize>>,
    index: HashMap<String, usize>,
}

impl ColumnSet {
    /// Validate and flatten `definitions`.
    pub fn new(definitions: Vec<Column>) -> Result<Self, ColumnError> {
        let mut seen = HashSet::new();
        let mut leaves = Vec::new();
        let mut parents = Vec::new();

        for (def_idx, def) in definitions.iter().enumerate() {
            check_id(&def.id, &mut seen)?;
            if !def.is_group() {
                leaves.push(def.clone());
                parents.push(None);
                continue;
            }
            if def.columns.is_empty() {
                return Err(ColumnError::EmptyGroup(def.id.clone()));
            }
            for child in &def.columns {
                if child.is_group() {
                    return Err(ColumnError::NestingTooDeep(def.id.clone()));
                }
                check_id(&child.id, &mut seen)?;
                leaves.push(child.clone());
                parents.push(Some(def_idx));
            }
        }

        let index = leaves
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        Ok(Self {
            definitions,
            leaves,
            parents,
            index,
        })
    }

    /// Top-level definitions as supplied.
    #[must_use]
    pub fn definitions(&self) -> &[Column] {
        &self.definitions
    }

    /// Leaf columns in definition order.
    #[must_use]
    pub fn leaves(&self) -> &[Column] {
        &self.leaves
    }

    /// Leaf ids in definition order.
    pub fn leaf_ids(&self) -> impl Iterator<Item = &str> {
        self.leaves.iter().map(|c| c.id.as_str())
    }

    /// Leaf column by id.
    #[must_use]
    pub fn leaf(&self, id: &str) -> Option<&Column> {
        self.index.get(id).map(|&i| &self.leaves[i])
    }

    /// Whether `id` names a leaf column.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Header group a leaf belongs to.
    #[must_use]
    pub fn group_of(&self, leaf_id: &str) -> Option<&Column> {
        let i = *self.index.get(leaf_id)?;
        self.parents[i].map(|d| &self.definitions[d])
    }

    /// Header group definition by id.
    #[must_use]
    pub fn header_group(&self, id: &str) -> Option<&Column> {
        self.definitions.iter().find(|d| d.is_group() && d.id == id)
    }

    /// Whether any definition is a header group.
    #[must_use]
    pub fn has_header_groups(&self) -> bool {
        self.definitions.iter().any(Column::is_group)
    }

    /// Id the default sort uses.
    #[must_use]
    pub fn default_sort_id(&self) -> Option<&str> {
        self.definitions.first().and_then(Column::default_sort_id)
    }

    /// Number of leaf columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether there are no leaf columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

fn check_id(id: &str, seen: &mut HashSet<String>) -> Result<(), ColumnError> {
    if id.is_empty() {
        return Err(ColumnError::EmptyId);
    }
    if !seen.insert(id.to_string()) {
        return Err(ColumnError::DuplicateId(id.to_string()));
    }
    Ok(())
}
