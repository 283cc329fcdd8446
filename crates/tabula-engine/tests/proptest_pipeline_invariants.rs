//! Property-based invariant tests for the recomputation pipeline.
//!
//! 1. Sorting is stable in both directions, including columns that mix
//!    nulls, booleans, numbers and strings.
//! 2. Sorting a column twice restores ascending order.
//! 3. Numeric range filters keep exactly the rows inside the bounds.
//! 4. Observed min/max bound every numeric value.
//! 5. `gotoPage` clamps: beyond the end lands on the last page, negative on
//!    the first.
//! 6. Pages partition the rows: every row appears on exactly one page.
//! 7. Fuzzy filtering never adds rows and an empty needle keeps all.
//! 8. No panics on arbitrary action sequences, extreme resizes inside a
//!    header group included.

use proptest::prelude::*;
use serde_json::Value;
use tabula_engine::row::compare_values;
use tabula_engine::{
    CellKind, Column, FilterStrategy, FilterValue, Row, SortRule, TableAction, TableEngine,
    ViewState, fuzzy_text, get_min_and_max, numeric,
};

// ── Strategies ────────────────────────────────────────────────────────────

fn scores(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(-20i64..=20, 0..=max_len)
}

fn rows_from(scores: &[i64]) -> Vec<Row> {
    scores
        .iter()
        .enumerate()
        .map(|(i, &s)| Row::new().with("pos", i).with("score", s))
        .collect()
}

/// Cells of every JSON scalar type, including strings that read as numbers.
fn mixed_cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-50i64..50).prop_map(Value::from),
        (-50.0f64..50.0).prop_map(Value::from),
        (-9i64..10, 0u8..100).prop_map(|(i, f)| Value::from(format!("{i}.{f}"))),
        "[a-c]{0,2}[0-9]{0,3}".prop_map(Value::from),
    ]
}

fn mixed_rows(cells: &[Value]) -> Vec<Row> {
    cells
        .iter()
        .enumerate()
        .map(|(i, v)| Row::new().with("pos", i).with("mixed", v.clone()))
        .collect()
}

fn page_mixed(engine: &TableEngine) -> Vec<(Value, usize)> {
    engine
        .projection()
        .page
        .iter()
        .map(|row| {
            let value = match &row.cell("mixed").expect("mixed cell").kind {
                CellKind::Plain(v) => v.clone(),
                other => panic!("unexpected cell {other:?}"),
            };
            (value, row.index.expect("leaf row"))
        })
        .collect()
}

fn columns() -> Vec<Column> {
    vec![
        Column::new("pos"),
        Column::new("score").filter(FilterStrategy::Numeric),
    ]
}

fn engine(scores: &[i64], page_size: usize) -> TableEngine {
    TableEngine::builder("props", columns())
        .rows(rows_from(scores))
        .initial_state(ViewState::default().with_page_size(page_size))
        .build()
        .expect("valid columns")
}

fn page_scores(engine: &TableEngine) -> Vec<(i64, usize)> {
    engine
        .projection()
        .page
        .iter()
        .map(|row| {
            let score = match &row.cell("score").expect("score cell").kind {
                CellKind::Plain(Value::Number(n)) => n.as_i64().expect("integer"),
                other => panic!("unexpected cell {other:?}"),
            };
            (score, row.index.expect("leaf row"))
        })
        .collect()
}

fn resize_delta() -> impl Strategy<Value = i32> {
    prop_oneof![
        -200i32..200,
        any::<i32>(),
        Just(i32::MAX),
        Just(i32::MIN),
    ]
}

fn view_action_strategy() -> impl Strategy<Value = TableAction> {
    prop_oneof![
        prop_oneof![Just("pos"), Just("score"), Just("mixed"), Just("ghost")]
            .prop_map(|id| TableAction::SetSort(id.to_string())),
        prop_oneof![Just("pos"), Just("score"), Just("mixed")]
            .prop_map(|id| TableAction::ToggleGroup(id.to_string())),
        prop_oneof![Just("pos"), Just("score"), Just("Stats")]
            .prop_map(|id| TableAction::ToggleColumnVisibility(id.to_string())),
        (-20i64..20, -20i64..20).prop_map(|(a, b)| TableAction::SetFilter {
            id: "score".into(),
            value: Some(FilterValue::range(Some(a as f64), Some(b as f64))),
        }),
        Just(TableAction::ClearFilters),
        (prop_oneof![Just("pos"), Just("score")], resize_delta()).prop_map(|(id, delta)| {
            TableAction::ResizeColumn {
                id: id.to_string(),
                delta,
            }
        }),
    ]
}

fn page_and_row_action_strategy() -> impl Strategy<Value = TableAction> {
    prop_oneof![
        (-40i64..40).prop_map(TableAction::GotoPage),
        Just(TableAction::NextPage),
        Just(TableAction::PreviousPage),
        (0usize..30).prop_map(TableAction::SetPageSize),
        Just(TableAction::ToggleAllRowsSelected),
        (0usize..10).prop_map(|i| TableAction::ToggleRowSelection(i.to_string().into())),
        (-20i64..20).prop_map(|v| TableAction::ToggleRowExpanded(format!("score:{v}").into())),
    ]
}

fn action_strategy() -> impl Strategy<Value = TableAction> {
    prop_oneof![view_action_strategy(), page_and_row_action_strategy()]
}

// ─── 1. Stable sort ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn sort_is_stable_in_both_directions(values in scores(40)) {
        let mut engine = engine(&values, 1000);
        engine.set_sort("score");
        let asc = page_scores(&engine);
        for pair in asc.windows(2) {
            prop_assert!(pair[0].0 <= pair[1].0);
            if pair[0].0 == pair[1].0 {
                prop_assert!(pair[0].1 < pair[1].1, "ties keep input order");
            }
        }

        engine.set_sort("score");
        prop_assert_eq!(&engine.state().sort_by, &vec![SortRule::desc("score")]);
        let desc = page_scores(&engine);
        for pair in desc.windows(2) {
            prop_assert!(pair[0].0 >= pair[1].0);
            if pair[0].0 == pair[1].0 {
                prop_assert!(pair[0].1 < pair[1].1, "ties keep input order");
            }
        }
        prop_assert_eq!(asc.len(), values.len());
    }
}

proptest! {
    #[test]
    fn sort_is_stable_over_mixed_types(cells in proptest::collection::vec(mixed_cell(), 0..50)) {
        let mut engine = TableEngine::builder("mixed", vec![Column::new("pos"), Column::new("mixed")])
            .rows(mixed_rows(&cells))
            .initial_state(ViewState::default().with_page_size(1000))
            .build()
            .expect("valid columns");

        engine.set_sort("mixed");
        let asc = page_mixed(&engine);
        prop_assert_eq!(asc.len(), cells.len());
        for pair in asc.windows(2) {
            let ord = compare_values(&pair[0].0, &pair[1].0);
            prop_assert!(ord.is_le(), "{:?} sorted before {:?}", pair[0].0, pair[1].0);
            if ord.is_eq() {
                prop_assert!(pair[0].1 < pair[1].1, "ties keep input order");
            }
        }

        engine.set_sort("mixed");
        for pair in page_mixed(&engine).windows(2) {
            let ord = compare_values(&pair[0].0, &pair[1].0);
            prop_assert!(ord.is_ge());
            if ord.is_eq() {
                prop_assert!(pair[0].1 < pair[1].1, "ties keep input order");
            }
        }
    }
}

// ─── 2. Double toggle ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn toggling_twice_restores_order(values in scores(30)) {
        let mut engine = engine(&values, 1000);
        engine.set_sort("score");
        let first = page_scores(&engine);
        engine.set_sort("score");
        engine.set_sort("score");
        prop_assert_eq!(page_scores(&engine), first);
    }
}

// ─── 3. Numeric filter exactness ──────────────────────────────────────

proptest! {
    #[test]
    fn numeric_range_keeps_exactly_rows_in_bounds(
        values in scores(40),
        lo in -25i64..=25,
        hi in -25i64..=25,
    ) {
        let rows = rows_from(&values);
        let filter = FilterValue::range(Some(lo as f64), Some(hi as f64));
        let kept = numeric(&rows, "score", &filter);
        let expected = values.iter().filter(|&&v| lo <= v && v <= hi).count();
        prop_assert_eq!(kept.len(), expected);

        let mut engine = engine(&values, 1000);
        engine.set_filter("score", filter);
        prop_assert_eq!(engine.projection().filtered_row_count, expected);
        prop_assert!(page_scores(&engine).iter().all(|&(v, _)| lo <= v && v <= hi));
    }
}

// ─── 4. Min/max bounds ────────────────────────────────────────────────

proptest! {
    #[test]
    fn min_and_max_bound_every_value(values in scores(40)) {
        let rows = rows_from(&values);
        let (min, max) = get_min_and_max(&rows, "score");
        if values.is_empty() {
            prop_assert_eq!((min, max), (0.0, 0.0));
        } else {
            prop_assert!(min <= max);
            prop_assert!(values.iter().all(|&v| min <= v as f64 && v as f64 <= max));
            prop_assert!(values.iter().any(|&v| v as f64 == min));
            prop_assert!(values.iter().any(|&v| v as f64 == max));
        }
        prop_assert_eq!(get_min_and_max(&rows, "missing"), (0.0, 0.0));
    }
}

// ─── 5. Page clamping ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn goto_page_clamps(
        len in 0usize..60,
        page_size in 1usize..15,
        target in -100i64..100,
    ) {
        let values = vec![0; len];
        let mut engine = engine(&values, page_size);
        engine.goto_page(target);
        let pages = len.div_ceil(page_size);
        let expected = if target < 0 {
            0
        } else {
            (target as usize).min(pages.saturating_sub(1))
        };
        prop_assert_eq!(engine.state().page_index, expected);
        prop_assert_eq!(engine.page_count(), pages);
    }
}

// ─── 6. Pages partition rows ──────────────────────────────────────────

proptest! {
    #[test]
    fn pages_partition_rows(values in scores(50), page_size in 1usize..12) {
        let mut engine = engine(&values, page_size);
        let mut seen = Vec::new();
        loop {
            seen.extend(page_scores(&engine).into_iter().map(|(_, i)| i));
            if !engine.next_page() {
                break;
            }
        }
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..values.len()).collect::<Vec<_>>());
    }
}

// ─── 7. Fuzzy filtering ───────────────────────────────────────────────

proptest! {
    #[test]
    fn fuzzy_filter_is_a_subset(
        names in proptest::collection::vec("[a-z]{1,10}", 0..20),
        needle in "[a-z]{0,4}",
    ) {
        let rows: Vec<Row> = names.iter().map(|n| Row::new().with("name", n.as_str())).collect();
        let kept = fuzzy_text(&rows, "name", &FilterValue::text(needle.clone()));
        prop_assert!(kept.len() <= rows.len());
        if needle.is_empty() {
            prop_assert_eq!(kept.len(), rows.len());
        }
        for row in kept {
            let name = row.get("name").and_then(Value::as_str).unwrap_or_default();
            let mut chars = name.chars();
            prop_assert!(
                needle.chars().all(|c| chars.any(|n| n == c)),
                "{} should contain {} in order", name, needle
            );
        }
    }
}

// ─── 8. Arbitrary sequences ───────────────────────────────────────────

proptest! {
    #[test]
    fn arbitrary_actions_keep_invariants(
        values in scores(30),
        mixed in proptest::collection::vec(mixed_cell(), 30),
        actions in proptest::collection::vec(action_strategy(), 0..40),
    ) {
        let rows = values
            .iter()
            .zip(&mixed)
            .enumerate()
            .map(|(i, (&score, cell))| {
                Row::new().with("pos", i).with("score", score).with("mixed", cell.clone())
            });
        let mut engine = TableEngine::builder(
            "props",
            vec![
                Column::group(
                    "Stats",
                    [Column::new("pos"), Column::new("score").filter(FilterStrategy::Numeric)],
                ),
                Column::new("mixed"),
            ],
        )
        .rows(rows)
        .initial_state(ViewState::default().with_page_size(5))
        .build()
        .expect("valid columns");
        for action in actions {
            engine.dispatch(action);
            let state = engine.state();
            prop_assert!(state.page_size >= 1);
            prop_assert!(state.page_index < engine.page_count().max(1));
            prop_assert_eq!(state.sort_by.len(), 1);
            prop_assert!(engine.projection().page.len() <= state.page_size);
        }
    }
}
