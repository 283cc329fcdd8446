//! Named filter strategies.
//!
//! A column selects its strategy by identifier (`"text"`, `"fuzzyText"`,
//! `"numeric"`). Resolvers are pure: they never fail, and a malformed filter
//! value degrades to "no constraint" on the malformed part.
//!
//! # Failure Modes
//!
//! | Input | Behavior |
//! |-------|----------|
//! | Empty value (`""`, `null`, `[null, null]`) | Filter is removed from state |
//! | Unparseable numeric bound | Bound defaults to the observed min/max |
//! | Non-numeric cell under a numeric filter | Row excluded |

use std::fmt;
use std::str::FromStr;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::row::{Row, as_f64, render_value};

/// Filter strategy of a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FilterStrategy {
    /// Case-insensitive substring match.
    #[default]
    Text,
    /// Substring match, falling back to fuzzy subsequence matching.
    FuzzyText,
    /// Inclusive numeric range.
    Numeric,
}

impl FilterStrategy {
    /// Identifier used in column definitions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FilterStrategy::Text => "text",
            FilterStrategy::FuzzyText => "fuzzyText",
            FilterStrategy::Numeric => "numeric",
        }
    }
}

impl fmt::Display for FilterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "includes" => Ok(FilterStrategy::Text),
            "fuzzyText" | "fuzzy_text" | "fuzzy" => Ok(FilterStrategy::FuzzyText),
            "numeric" | "between" => Ok(FilterStrategy::Numeric),
            other => Err(format!("unknown filter strategy: {other}")),
        }
    }
}

/// A column filter value as the user entered it.
///
/// Text strategies read a string; the numeric strategy reads a two-element
/// array `[min, max]` where either side may be `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterValue(pub Value);

impl FilterValue {
    /// Text filter.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self(Value::String(text.into()))
    }

    /// Numeric range filter; `None` leaves that side open.
    #[must_use]
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        let side = |v: Option<f64>| v.map_or(Value::Null, Value::from);
        Self(Value::Array(vec![side(min), side(max)]))
    }

    /// Whether the value constrains nothing and should be dropped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        is_blank(&self.0)
    }

    /// The search text for text strategies.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match &self.0 {
            Value::String(s) => Some(s.clone()),
            Value::Number(_) | Value::Bool(_) => Some(render_value(&self.0)),
            Value::Array(items) => items
                .iter()
                .find(|v| !is_blank(v))
                .map(render_value),
            _ => None,
        }
    }

    /// `(min, max)` bounds; unparseable sides are `None`.
    ///
    /// A scalar number is read as an exact match.
    #[must_use]
    pub fn range_bounds(&self) -> (Option<f64>, Option<f64>) {
        match &self.0 {
            Value::Array(items) => (
                items.first().and_then(as_f64),
                items.get(1).and_then(as_f64),
            ),
            scalar => {
                let v = as_f64(scalar);
                (v, v)
            }
        }
    }

    /// Short human-readable form used by filter chips.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.0 {
            Value::Array(_) => match self.range_bounds() {
                (Some(min), Some(max)) => format!("{}–{}", fmt_num(min), fmt_num(max)),
                (Some(min), None) => format!("≥ {}", fmt_num(min)),
                (None, Some(max)) => format!("≤ {}", fmt_num(max)),
                (None, None) => String::new(),
            },
            other => render_value(other),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Read access to a row's resolved column values.
pub trait RowValues {
    /// Value of column `column_id`, if the row has one.
    fn value(&self, column_id: &str) -> Option<&Value>;
}

impl RowValues for Row {
    fn value(&self, column_id: &str) -> Option<&Value> {
        self.get(column_id)
    }
}

impl<T: RowValues + ?Sized> RowValues for &T {
    fn value(&self, column_id: &str) -> Option<&Value> {
        (**self).value(column_id)
    }
}

/// A filter value compiled against a strategy, ready to test cells.
pub enum CompiledFilter {
    /// Lowercased needle.
    Text(String),
    /// Lowercased needle plus a fuzzy matcher.
    Fuzzy {
        needle: String,
        matcher: SkimMatcherV2,
    },
    /// Inclusive bounds.
    Numeric { min: f64, max: f64 },
    /// Constrains nothing.
    Pass,
}

impl fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledFilter::Text(needle) => f.debug_tuple("Text").field(needle).finish(),
            CompiledFilter::Fuzzy { needle, .. } => f.debug_tuple("Fuzzy").field(needle).finish(),
            CompiledFilter::Numeric { min, max } => f
                .debug_struct("Numeric")
                .field("min", min)
                .field("max", max)
                .finish(),
            CompiledFilter::Pass => f.write_str("Pass"),
        }
    }
}

impl CompiledFilter {
    /// Compile `value` for `strategy`. Numeric defaults come from `rows`.
    pub fn compile<R: RowValues>(
        strategy: FilterStrategy,
        rows: &[R],
        column_id: &str,
        value: &FilterValue,
    ) -> Self {
        if value.is_empty() {
            return CompiledFilter::Pass;
        }
        match strategy {
            FilterStrategy::Text => value
                .as_text()
                .map_or(CompiledFilter::Pass, |t| CompiledFilter::Text(t.to_lowercase())),
            FilterStrategy::FuzzyText => value.as_text().map_or(CompiledFilter::Pass, |t| {
                CompiledFilter::Fuzzy {
                    needle: t.to_lowercase(),
                    matcher: SkimMatcherV2::default().ignore_case(),
                }
            }),
            FilterStrategy::Numeric => {
                let (lo, hi) = value.range_bounds();
                let (observed_min, observed_max) = get_min_and_max(rows, column_id);
                CompiledFilter::Numeric {
                    min: lo.unwrap_or(observed_min),
                    max: hi.unwrap_or(observed_max),
                }
            }
        }
    }

    /// Whether a cell holding `cell` passes.
    #[must_use]
    pub fn matches(&self, cell: Option<&Value>) -> bool {
        match self {
            CompiledFilter::Pass => true,
            CompiledFilter::Text(needle) => {
                let text = cell.map(render_value).unwrap_or_default();
                text.to_lowercase().contains(needle.as_str())
            }
            CompiledFilter::Fuzzy { needle, matcher } => {
                let text = cell.map(render_value).unwrap_or_default();
                text.to_lowercase().contains(needle.as_str())
                    || matcher.fuzzy_match(&text, needle).is_some()
            }
            CompiledFilter::Numeric { min, max } => cell
                .and_then(as_f64)
                .is_some_and(|v| *min <= v && v <= *max),
        }
    }
}

fn apply<'a, R: RowValues>(
    strategy: FilterStrategy,
    rows: &'a [R],
    column_id: &str,
    value: &FilterValue,
) -> Vec<&'a R> {
    let filter = CompiledFilter::compile(strategy, rows, column_id, value);
    rows.iter()
        .filter(|row| filter.matches(row.value(column_id)))
        .collect()
}

/// Rows whose rendered `column_id` value contains the filter text, or
/// matches it as a fuzzy subsequence. Case-insensitive.
pub fn fuzzy_text<'a, R: RowValues>(
    rows: &'a [R],
    column_id: &str,
    value: &FilterValue,
) -> Vec<&'a R> {
    apply(FilterStrategy::FuzzyText, rows, column_id, value)
}

/// Rows whose `column_id` value lies in `[min, max]` inclusive. Missing
/// bounds default to the observed minimum/maximum.
pub fn numeric<'a, R: RowValues>(
    rows: &'a [R],
    column_id: &str,
    value: &FilterValue,
) -> Vec<&'a R> {
    apply(FilterStrategy::Numeric, rows, column_id, value)
}

/// Rows whose rendered `column_id` value contains the filter text.
pub fn text<'a, R: RowValues>(rows: &'a [R], column_id: &str, value: &FilterValue) -> Vec<&'a R> {
    apply(FilterStrategy::Text, rows, column_id, value)
}

/// Observed `(min, max)` of the numeric values of `column_id`, in one pass
/// seeded from the first numeric value. `(0, 0)` when there is none.
pub fn get_min_and_max<R: RowValues>(rows: &[R], column_id: &str) -> (f64, f64) {
    let mut values = rows
        .iter()
        .filter_map(|row| row.value(column_id).and_then(as_f64));
    let Some(first) = values.next() else {
        return (0.0, 0.0);
    };
    values.fold((first, first), |(min, max), v| (min.min(v), max.max(v)))
}
