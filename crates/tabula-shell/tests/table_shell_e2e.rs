//! Table shell end-to-end tests.
//!
//! # Running Tests
//!
//! ```sh
//! cargo test -p tabula-shell --test table_shell_e2e
//! ```

#![cfg(test)]

use std::sync::{Arc, Mutex};

use tabula_engine::{
    Align, Column, EngineConfig, FilterStrategy, FilterValue, Row, ServerPagination, TableEngine,
};
use tabula_shell::{ServerPaging, ShellEvent, TableShell, TextRenderer};

// ============================================================================
// Test Utilities
// ============================================================================

fn log_jsonl(event: &str, case: &str, passed: bool, details: &str) {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    eprintln!(
        r#"{{"event":"{event}","case":"{case}","passed":{passed},"details":"{details}","timestamp":{timestamp}}}"#
    );
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn systems_engine(config: EngineConfig) -> TableEngine {
    let rows = [
        ("default", "echo", 3, "RUNNING"),
        ("default", "echo-sleeper", 2, "RUNNING"),
        ("test", "complex", 11, "STOPPED"),
        ("default", "dynamic", 6, "RUNNING"),
    ]
    .into_iter()
    .map(|(ns, name, commands, status)| {
        Row::new()
            .with("namespace", ns)
            .with("name", name)
            .with("commands", commands)
            .with("status", status)
    });
    TableEngine::builder(
        "systems",
        vec![
            Column::group(
                "Plugin",
                [
                    Column::new("namespace").header("Namespace"),
                    Column::new("name").header("System").filter(FilterStrategy::FuzzyText),
                ],
            ),
            Column::new("commands")
                .header("Commands")
                .filter(FilterStrategy::Numeric),
            Column::new("status").header("Status"),
        ],
    )
    .rows(rows)
    .config(config)
    .build()
    .unwrap()
}

// ============================================================================
// 1. Rendering
// ============================================================================

#[test]
fn renders_sections_in_order() {
    init_tracing();
    let engine = TableEngine::builder(
        "demo",
        vec![
            Column::new("name").header("Name").width(80),
            Column::new("n").header("N").width(40).align(Align::Right),
        ],
    )
    .rows([
        Row::new().with("name", "beta-long-name").with("n", 22),
        Row::new().with("name", "alpha").with("n", 1),
    ])
    .build()
    .unwrap();
    let shell = TableShell::new(engine).title("Demo");

    let lines = TextRenderer::new().render(&shell.view());
    assert_eq!(
        lines,
        [
            "Demo  [x] Name  [x] N",
            "    ⊕ Name ▲   ┃ ⊕ N ⇅ ┃",
            "[ ] alpha      │     1 │",
            "[ ] beta-long… │    22 │",
            "1–2 of 2   Rows per page: [10] 25 100",
        ]
    );

    log_jsonl("render", "sections", true, "toolbar, head, body, pagination");
}

#[test]
fn chips_header_content_and_groups() {
    let mut shell = TableShell::new(systems_engine(EngineConfig::default()))
        .title("Systems")
        .toolbar_slot("[search]")
        .header_content("Namespaces: default, test");

    shell.handle(ShellEvent::FilterChanged {
        id: "name".into(),
        value: Some(FilterValue::text("ech")),
    });
    let view = shell.view();
    assert_eq!(view.toolbar.slot.as_deref(), Some("[search]"));
    assert_eq!(view.chips.chips.len(), 1);
    assert_eq!(view.head.len(), 2, "header group adds a top row");
    assert_eq!(view.body.len(), 2);

    let lines = TextRenderer::new().render(&view);
    assert_eq!(lines[0], "Systems  [x] Plugin  [x] Commands  [x] Status  [search]");
    assert_eq!(lines[1], "System: ech ✕");
    assert_eq!(lines[2], "Namespaces: default, test");
    assert!(lines[3].contains("Plugin"));

    shell.handle(ShellEvent::ChipDismissed("name".into()));
    shell.handle(ShellEvent::GroupToggled("status".into()));
    shell.handle(ShellEvent::RowExpansionToggled("status:RUNNING".into()));
    let view = shell.view();
    assert_eq!(view.body.len(), 5);
    assert_eq!(view.body[0].cells[0].text, "RUNNING (3)");
    assert!(view.body[1].cells[0].text.is_empty(), "placeholder under a group");

    let lines = TextRenderer::new().render(&view);
    assert!(lines.iter().any(|l| l.contains("▾ RUNNING (3)")));
    assert!(lines.iter().any(|l| l.contains("▸ STOPPED (1)")));

    log_jsonl("render", "chips_groups", true, "chip dismissed, group expanded");
}

#[test]
fn toolbar_toggle_hides_group_members() {
    let mut shell = TableShell::new(systems_engine(EngineConfig::default()));
    shell.handle(ShellEvent::ColumnVisibilityToggled("Plugin".into()));
    let view = shell.view();
    assert!(!view.toolbar.toggles[0].visible);
    assert!(
        view.head[0].headers.iter().all(|h| h.is_placeholder),
        "hidden group leaves only placeholders in the top row"
    );
    assert_eq!(view.body[0].cells.len(), 2);
}

// ============================================================================
// 2. Server Pagination
// ============================================================================

#[test]
fn server_pagination_forwards_changes() {
    init_tracing();
    let pages = Arc::new(Mutex::new(Vec::new()));
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let (p, s) = (Arc::clone(&pages), Arc::clone(&sizes));

    let mut shell = TableShell::new(systems_engine(
        EngineConfig::default().with_manual_pagination(true),
    ))
    .server_pagination(ServerPaging::new(
        ServerPagination::new(120, 500),
        move |page| p.lock().unwrap().push(page),
        move |size| s.lock().unwrap().push(size),
    ));
    assert_eq!(shell.engine().page_count(), 12);

    shell.handle(ShellEvent::NextPageRequested);
    shell.handle(ShellEvent::PageRequested(5));
    shell.handle(ShellEvent::PreviousPageRequested);
    assert_eq!(*pages.lock().unwrap(), [1, 5, 4]);
    assert_eq!(shell.engine().state().page_index, 4);

    let view = shell.view();
    assert_eq!(view.body.len(), 4, "server rows are not sliced again");
    assert_eq!(
        view.pagination.as_ref().unwrap().label,
        "Displaying 41–50 of 120 (filtered from 500)"
    );

    shell.handle(ShellEvent::PageSizeSelected(100));
    assert_eq!(*sizes.lock().unwrap(), [100]);
    assert_eq!(shell.engine().state().page_index, 0);
    assert_eq!(shell.engine().page_count(), 2);

    shell.set_server_counts(ServerPagination::new(0, 500));
    assert!(shell.view().pagination.is_none(), "hidden without rows");

    log_jsonl("pagination", "server", true, "callbacks saw every change");
}
