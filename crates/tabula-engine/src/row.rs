//! Row records, row keys and cell value helpers.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One input record: an opaque mapping from field name to value.
///
/// The engine never interprets fields beyond what column accessors read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    /// Empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Convert a JSON object into a row. Non-objects yield `None`.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set `field` to `value`.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Iterate over `(field, value)` pairs.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Stable identity of a projected row.
///
/// Leaf rows use their position in the input (`"0"`, `"1"`, ...) unless a key
/// accessor is configured. Group rows use `column:value`, nested groups join
/// their ancestors with `>` (`namespace:default>name:echo`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    /// Wrap a key string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Positional key for the row at `index`.
    #[must_use]
    pub fn positional(index: usize) -> Self {
        Self(index.to_string())
    }

    /// Key of the group for `column_id == value` beneath `parent`.
    #[must_use]
    pub fn group(parent: Option<&RowKey>, column_id: &str, value: &str) -> Self {
        match parent {
            Some(parent) => Self(format!("{}>{column_id}:{value}", parent.0)),
            None => Self(format!("{column_id}:{value}")),
        }
    }

    /// The key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for RowKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Text a plain cell shows for `value`.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Numeric reading of `value`: numbers, and strings that parse as finite
/// numbers.
#[must_use]
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Ordering used by column sorting.
///
/// Values of different JSON types never compare by content; they rank
/// null, boolean, number, string, then arrays and objects. Within a type,
/// numbers compare numerically, booleans `false < true`, and the rest by
/// alphanumeric comparison of the rendered text (digit runs compare by
/// magnitude, so `job-9 < job-10`). The result is a total order, which
/// `slice::sort_by` relies on.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => compare_alphanumeric(&render_value(a), &render_value(b)),
    })
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}

fn compare_alphanumeric(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare_chunk(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
    // Case-only differences still order deterministically.
    a.cmp(b)
}

fn compare_chunk(a: &str, b: &str) -> Ordering {
    let a_digits = a.bytes().all(|c| c.is_ascii_digit());
    let b_digits = b.bytes().all(|c| c.is_ascii_digit());
    match (a_digits, b_digits) {
        (true, true) => {
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// Split into alternating runs of ASCII digits and non-digits.
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_builder_and_lookup() {
        let row = Row::new().with("name", "echo").with("count", 3);
        assert_eq!(row.get("name"), Some(&json!("echo")));
        assert_eq!(row.get("count"), Some(&json!(3)));
        assert!(row.get("missing").is_none());
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn row_from_json_rejects_non_objects() {
        assert!(Row::from_json(json!({"a": 1})).is_some());
        assert!(Row::from_json(json!([1, 2])).is_none());
    }

    #[test]
    fn render_values() {
        assert_eq!(render_value(&json!(null)), "");
        assert_eq!(render_value(&json!("x")), "x");
        assert_eq!(render_value(&json!(5)), "5");
        assert_eq!(render_value(&json!(2.5)), "2.5");
        assert_eq!(render_value(&json!(["a", 1])), "a, 1");
    }

    #[test]
    fn numeric_reading() {
        assert_eq!(as_f64(&json!(4)), Some(4.0));
        assert_eq!(as_f64(&json!(" 4.5 ")), Some(4.5));
        assert_eq!(as_f64(&json!("abc")), None);
        assert_eq!(as_f64(&json!(true)), None);
    }

    #[test]
    fn compare_orders_numbers_numerically() {
        assert_eq!(compare_values(&json!(9), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(null), &json!(0)), Ordering::Less);
    }

    #[test]
    fn compare_alphanumeric_runs() {
        assert_eq!(compare_values(&json!("job-9"), &json!("job-10")), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("A")), Ordering::Greater);
        assert_eq!(compare_values(&json!("a"), &json!("a")), Ordering::Equal);
        assert_eq!(compare_values(&json!("v1.2"), &json!("v1.10")), Ordering::Less);
    }

    #[test]
    fn mixed_types_rank_before_content() {
        // Numbers never compare against strings by text, so this cannot cycle.
        let (a, b, c) = (json!(2.25), json!(2.5), json!("2.10"));
        assert_eq!(compare_values(&a, &b), Ordering::Less);
        assert_eq!(compare_values(&b, &c), Ordering::Less);
        assert_eq!(compare_values(&a, &c), Ordering::Less);
        assert_eq!(compare_values(&c, &a), Ordering::Greater);

        let ranked = [json!(null), json!(true), json!(-3), json!("-4"), json!(["x"]), json!({"k": 1})];
        for pair in ranked.windows(2) {
            assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less, "{pair:?}");
        }
    }

    #[test]
    fn sorting_mixed_column_does_not_panic() {
        let pool = [json!(2.25), json!(2.5), json!("2.10"), json!(null), json!(false), json!("b")];
        let mut values: Vec<Value> = (0..60).map(|i| pool[(i * 7 + i / 3) % pool.len()].clone()).collect();
        values.sort_by(compare_values);
        for pair in values.windows(2) {
            assert_ne!(compare_values(&pair[0], &pair[1]), Ordering::Greater);
        }
    }

    #[test]
    fn group_keys_nest() {
        let parent = RowKey::group(None, "namespace", "default");
        let child = RowKey::group(Some(&parent), "name", "echo");
        assert_eq!(child.as_str(), "namespace:default>name:echo");
    }
}
