//! Recomputation stages.
//!
//! ```text
//! rows ─▶ prepare_rows ─▶ filter_rows ─▶ group_rows ─▶ sort_rows ─▶ expand_rows ─▶ page slice
//! ```
//!
//! Each stage is a plain function over indices into the prepared rows; the
//! order is fixed and no stage looks at the output of a later one.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::column::{ColumnFlags, ColumnSet};
use crate::filter::{CompiledFilter, FilterValue, RowValues};
use crate::row::{Row, RowKey, compare_values, render_value};
use crate::state::SortRule;

/// Derives a stable key from a row.
pub type RowKeyFn = Arc<dyn Fn(&Row, usize) -> RowKey + Send + Sync>;

/// A source row with every leaf column's value resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRow {
    /// Position in the input.
    pub index: usize,
    pub key: RowKey,
    pub values: HashMap<String, Value>,
}

impl RowValues for PreparedRow {
    fn value(&self, column_id: &str) -> Option<&Value> {
        self.values.get(column_id)
    }
}

/// Resolve each row's column values through the column accessors.
pub fn prepare_rows(rows: &[Row], columns: &ColumnSet, key_fn: Option<&RowKeyFn>) -> Vec<PreparedRow> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let values = columns
                .leaves()
                .iter()
                .filter_map(|c| Some((c.column_id().to_string(), c.accessor()?.value(row))))
                .collect();
            let key = key_fn.map_or_else(|| RowKey::positional(index), |f| f(row, index));
            PreparedRow { index, key, values }
        })
        .collect()
}

/// Indices of the rows passing every filter. Filters on unknown or
/// non-filterable columns are ignored.
pub fn filter_rows(
    rows: &[PreparedRow],
    columns: &ColumnSet,
    filters: &BTreeMap<String, FilterValue>,
) -> Vec<usize> {
    let compiled: Vec<(&str, CompiledFilter)> = filters
        .iter()
        .filter_map(|(id, value)| {
            let column = columns.leaf(id)?;
            if !column.flags().contains(ColumnFlags::FILTERABLE) {
                return None;
            }
            let strategy = column.filter_strategy().unwrap_or_default();
            Some((id.as_str(), CompiledFilter::compile(strategy, rows, id, value)))
        })
        .collect();

    (0..rows.len())
        .filter(|&i| {
            compiled
                .iter()
                .all(|(id, f)| f.matches(rows[i].value(id)))
        })
        .collect()
}

/// A node of the grouped row tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Index into the prepared rows.
    Leaf(usize),
    Group(GroupNode),
}

/// A synthesized group row.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub key: RowKey,
    /// Column this level groups by.
    pub column_id: String,
    /// Shared value of the grouped column.
    pub value: Value,
    /// Nesting level, 0 for the outermost grouping.
    pub depth: usize,
    pub children: Vec<Node>,
    /// Number of leaf rows beneath.
    pub leaf_count: usize,
    /// Aggregated values per column id.
    pub aggregates: HashMap<String, Value>,
}

/// Partition `indices` by the distinct rendered values of each `group_by`
/// column in turn, in first-seen order. Ungrouped input yields leaves.
pub fn group_rows(
    rows: &[PreparedRow],
    indices: Vec<usize>,
    columns: &ColumnSet,
    group_by: &[String],
) -> Vec<Node> {
    group_level(rows, indices, columns, group_by, 0, None)
}

fn group_level(
    rows: &[PreparedRow],
    indices: Vec<usize>,
    columns: &ColumnSet,
    group_by: &[String],
    depth: usize,
    parent: Option<&RowKey>,
) -> Vec<Node> {
    let Some((column_id, rest)) = group_by.split_first() else {
        return indices.into_iter().map(Node::Leaf).collect();
    };

    let mut buckets: Vec<(String, Value, Vec<usize>)> = Vec::new();
    let mut slot: HashMap<String, usize> = HashMap::new();
    for i in indices {
        let value = rows[i].value(column_id).cloned().unwrap_or(Value::Null);
        let rendered = render_value(&value);
        match slot.get(&rendered) {
            Some(&b) => buckets[b].2.push(i),
            None => {
                slot.insert(rendered.clone(), buckets.len());
                buckets.push((rendered, value, vec![i]));
            }
        }
    }

    buckets
        .into_iter()
        .map(|(rendered, value, members)| {
            let key = RowKey::group(parent, column_id, &rendered);
            let aggregates = aggregate(rows, &members, columns, group_by);
            let leaf_count = members.len();
            let children = group_level(rows, members, columns, rest, depth + 1, Some(&key));
            Node::Group(GroupNode {
                key,
                column_id: column_id.clone(),
                value,
                depth,
                children,
                leaf_count,
                aggregates,
            })
        })
        .collect()
}

fn aggregate(
    rows: &[PreparedRow],
    members: &[usize],
    columns: &ColumnSet,
    group_by: &[String],
) -> HashMap<String, Value> {
    columns
        .leaves()
        .iter()
        .filter(|c| !group_by.iter().any(|g| g == c.column_id()))
        .filter_map(|c| {
            let aggregation = c.aggregation()?;
            let values: Vec<&Value> = members
                .iter()
                .filter_map(|&i| rows[i].value(c.column_id()))
                .collect();
            Some((c.column_id().to_string(), aggregation.apply(&values)))
        })
        .collect()
}

fn node_value<'a>(rows: &'a [PreparedRow], node: &'a Node, column_id: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    match node {
        Node::Leaf(i) => rows[*i].value(column_id).unwrap_or(&NULL),
        Node::Group(g) if g.column_id == column_id => &g.value,
        Node::Group(g) => g.aggregates.get(column_id).unwrap_or(&NULL),
    }
}

/// Stable sort of `nodes` (and every group's children) by `sort_by`.
///
/// Rules chain: later rules break ties of earlier ones. Descending rules
/// reverse the comparison only, so equal rows keep their input order.
pub fn sort_rows(rows: &[PreparedRow], nodes: &mut [Node], sort_by: &[SortRule]) {
    if sort_by.is_empty() {
        return;
    }
    nodes.sort_by(|a, b| {
        sort_by
            .iter()
            .map(|rule| {
                let ord = compare_values(node_value(rows, a, &rule.id), node_value(rows, b, &rule.id));
                if rule.desc { ord.reverse() } else { ord }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    for node in nodes.iter_mut() {
        if let Node::Group(group) = node {
            sort_rows(rows, &mut group.children, sort_by);
        }
    }
}

/// A row of the flattened, expanded tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlatRow<'a> {
    Leaf { index: usize, depth: usize },
    Group { node: &'a GroupNode, expanded: bool },
}

impl FlatRow<'_> {
    /// Nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            FlatRow::Leaf { depth, .. } => *depth,
            FlatRow::Group { node, .. } => node.depth,
        }
    }
}

/// Flatten the tree depth-first, descending only into expanded groups.
pub fn expand_rows<'a>(nodes: &'a [Node], expanded: &BTreeSet<RowKey>) -> Vec<FlatRow<'a>> {
    let mut out = Vec::new();
    push_flat(nodes, expanded, 0, &mut out);
    out
}

fn push_flat<'a>(
    nodes: &'a [Node],
    expanded: &BTreeSet<RowKey>,
    depth: usize,
    out: &mut Vec<FlatRow<'a>>,
) {
    for node in nodes {
        match node {
            Node::Leaf(index) => out.push(FlatRow::Leaf { index: *index, depth }),
            Node::Group(group) => {
                let open = expanded.contains(&group.key);
                out.push(FlatRow::Group {
                    node: group,
                    expanded: open,
                });
                if open {
                    push_flat(&group.children, expanded, depth + 1, out);
                }
            }
        }
    }
}

/// Every group key in the tree.
pub fn group_keys(nodes: &[Node]) -> Vec<RowKey> {
    let mut keys = Vec::new();
    let mut stack: Vec<&Node> = nodes.iter().collect();
    while let Some(node) = stack.pop() {
        if let Node::Group(group) = node {
            keys.push(group.key.clone());
            stack.extend(group.children.iter());
        }
    }
    keys
}

/// Number of pages needed for `rows` rows.
#[must_use]
pub fn page_count(rows: usize, page_size: usize) -> usize {
    rows.div_ceil(page_size.max(1))
}

/// Clamp `index` to an existing page (0 when there are none).
#[must_use]
pub fn clamp_page(index: i64, page_count: usize) -> usize {
    let last = page_count.saturating_sub(1) as i64;
    index.clamp(0, last) as usize
}
