//! Plain-text rendering of a [`ShellView`].
//!
//! Column widths are pixels in the view state; the renderer maps them to
//! terminal cells at a fixed ratio and truncates by display width, never
//! splitting a grapheme.
//!
//! ```text
//! Systems  [x] Plugin  [x] Status
//! System: ech ✕
//!     │ Plugin                │
//!     ⊕ Name ▲ ┃ ⊕ Version ⇅ ┃ ⊕ Status ⇅ ┃
//! [ ] echo     │ 3.0.0       │ RUNNING    │
//! 1–1 of 1   Rows per page: [10] 25 100
//! ```

use tabula_engine::{Align, Header, SortDirection};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::pagination::PaginationView;
use crate::view::{RowView, ShellView};

/// Pixels per terminal cell.
pub const PIXELS_PER_CELL: u32 = 8;

const SEPARATOR: &str = " │ ";
const RESIZE_HANDLE: &str = " ┃ ";

/// Renders a [`ShellView`] to lines of text.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    pixels_per_cell: u32,
    ellipsis: String,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            pixels_per_cell: PIXELS_PER_CELL,
            ellipsis: "…".to_string(),
        }
    }
}

impl TextRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pixels per cell; 0 is treated as 1.
    #[must_use]
    pub fn pixels_per_cell(mut self, pixels: u32) -> Self {
        self.pixels_per_cell = pixels.max(1);
        self
    }

    #[must_use]
    pub fn ellipsis(mut self, ellipsis: impl Into<String>) -> Self {
        self.ellipsis = ellipsis.into();
        self
    }

    /// Cells available for a column `width` pixels wide.
    #[must_use]
    pub fn cells(&self, width: u32) -> usize {
        (width / self.pixels_per_cell).max(1) as usize
    }

    /// Render every section in display order. Empty sections produce no
    /// lines.
    #[must_use]
    pub fn render(&self, view: &ShellView) -> Vec<String> {
        let mut lines = Vec::new();

        let mut toolbar: Vec<String> = Vec::new();
        toolbar.extend(view.toolbar.title.clone());
        toolbar.extend(view.toolbar.toggles.iter().map(|t| {
            let mark = if t.visible { "[x]" } else { "[ ]" };
            format!("{mark} {}", t.label)
        }));
        toolbar.extend(view.toolbar.slot.clone());
        if !toolbar.is_empty() {
            lines.push(toolbar.join("  "));
        }

        if !view.chips.is_empty() {
            let chips: Vec<String> = view
                .chips
                .chips
                .iter()
                .map(|chip| format!("{} ✕", chip.caption()))
                .collect();
            lines.push(chips.join("  "));
        }

        lines.extend(view.header_content.clone());

        let leaf_cells: Vec<(String, usize)> = view
            .head
            .last()
            .map(|row| {
                row.headers
                    .iter()
                    .map(|h| (h.id.clone(), self.cells(h.width)))
                    .collect()
            })
            .unwrap_or_default();
        let span_cells = |ids: &[String]| -> usize {
            let sum: usize = ids
                .iter()
                .filter_map(|id| leaf_cells.iter().find(|(leaf, _)| leaf == id))
                .map(|(_, cells)| cells)
                .sum();
            sum + SEPARATOR.width() * ids.len().saturating_sub(1)
        };

        for row in &view.head {
            let mut line = String::from("    ");
            for header in &row.headers {
                let cells = span_cells(&header.column_ids);
                line.push_str(&self.fit(&header_text(header), cells, header.align));
                line.push_str(if header.can_resize { RESIZE_HANDLE } else { SEPARATOR });
            }
            lines.push(line.trim_end().to_string());
        }

        for row in &view.body {
            lines.push(self.body_line(row));
        }

        if let Some(pagination) = &view.pagination {
            lines.push(pagination_line(pagination));
        }

        lines
    }

    fn body_line(&self, row: &RowView) -> String {
        let mut line = String::from(match (row.is_group, row.selected) {
            (true, _) => "    ",
            (false, true) => "[x] ",
            (false, false) => "[ ] ",
        });
        for (i, cell) in row.cells.iter().enumerate() {
            let mut text = String::new();
            if i == 0 {
                text.push_str(&"  ".repeat(row.depth));
            }
            if row.is_group && matches!(cell.kind, tabula_engine::CellKind::Grouped { .. }) {
                text.push_str(if row.expanded { "▾ " } else { "▸ " });
            }
            text.push_str(&cell.text);
            line.push_str(&self.fit(&text, self.cells(cell.width), cell.align));
            line.push_str(SEPARATOR);
        }
        line.trim_end().to_string()
    }

    /// Truncate `text` to `cells` and pad it according to `align`.
    #[must_use]
    pub fn fit(&self, text: &str, cells: usize, align: Align) -> String {
        let text = truncate_with_ellipsis(text, cells, &self.ellipsis);
        pad(&text, cells, align)
    }
}

fn header_text(header: &Header) -> String {
    if header.is_placeholder {
        return String::new();
    }
    let mut text = String::new();
    if header.can_group {
        text.push_str(if header.is_grouped { "⊖ " } else { "⊕ " });
    }
    text.push_str(&header.label);
    match (header.sort, header.can_sort) {
        (Some(SortDirection::Ascending), _) => text.push_str(" ▲"),
        (Some(SortDirection::Descending), _) => text.push_str(" ▼"),
        (None, true) => text.push_str(" ⇅"),
        (None, false) => {}
    }
    text
}

fn pagination_line(view: &PaginationView) -> String {
    let options: Vec<String> = view
        .options
        .iter()
        .map(|&n| {
            if n == view.window.page_size {
                format!("[{n}]")
            } else {
                n.to_string()
            }
        })
        .collect();
    let mut line = format!("{}   Rows per page: {}", view.label, options.join(" "));
    if view.can_previous || view.can_next {
        line.push_str("   ");
        line.push_str(if view.can_previous { "‹" } else { " " });
        line.push(' ');
        line.push_str(if view.can_next { "›" } else { " " });
    }
    line.trim_end().to_string()
}

/// Pad `text` to `width` cells.
#[must_use]
pub fn pad(text: &str, width: usize, align: Align) -> String {
    let gap = width.saturating_sub(text.width());
    let (left, right) = match align {
        Align::Left => (0, gap),
        Align::Right => (gap, 0),
        Align::Center => (gap / 2, gap - gap / 2),
    };
    format!("{}{text}{}", " ".repeat(left), " ".repeat(right))
}

/// Truncate text to fit within a width, adding ellipsis if needed.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_width: usize, ellipsis: &str) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let ellipsis_width = ellipsis.width();
    if ellipsis_width >= max_width {
        return truncate_to_width(text, max_width);
    }
    let mut result = truncate_to_width(text, max_width - ellipsis_width);
    result.push_str(ellipsis);
    result
}

/// Longest grapheme prefix of `text` no wider than `max_width`.
#[must_use]
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    let mut result = String::new();
    let mut current = 0;
    for grapheme in text.graphemes(true) {
        let width = grapheme.width();
        if current + width > max_width {
            break;
        }
        result.push_str(grapheme);
        current += width;
    }
    result
}
