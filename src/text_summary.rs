//! Result-table builder for text output.
//!
//! Formats the fetched result set as aligned, human-readable lines.

use crate::model::ResultRow;

const HEADERS: [&str; 5] = ["Name", "Address", "Phone", "Delivery", "Website"];
const COLUMN_CAPS: [usize; 5] = [32, 40, 18, 10, 36];

/// Pre-formatted lines for text output.
pub struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a table of result rows plus the server-reported total.
pub fn build_result_table(results: &[ResultRow], total: u64) -> TextSummary {
    let mut lines = vec![format!("{total} found")];
    if results.is_empty() {
        lines.push("No results to show.".into());
        return TextSummary { lines };
    }

    let cells: Vec<[String; 5]> = results.iter().map(row_cells).collect();

    let mut widths = [0usize; 5];
    for (i, header) in HEADERS.iter().enumerate() {
        widths[i] = header.chars().count();
    }
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count()).min(COLUMN_CAPS[i]);
        }
    }

    lines.push(render_row(&HEADERS.map(String::from), &widths));
    lines.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in &cells {
        lines.push(render_row(row, &widths));
    }

    TextSummary { lines }
}

fn row_cells(row: &ResultRow) -> [String; 5] {
    [
        row.name.clone(),
        cell(row.address.as_deref()),
        cell(row.phone.as_deref()),
        cell(row.delivery.as_deref()),
        cell(row.website.as_deref()),
    ]
}

fn cell(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_owned(),
        _ => "-".into(),
    }
}

fn render_row(cells: &[String; 5], widths: &[usize; 5]) -> String {
    let mut out = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        out.push_str(&pad_or_truncate(cell, widths[i]));
    }
    out.trim_end().to_owned()
}

fn pad_or_truncate(value: &str, width: usize) -> String {
    let count = value.chars().count();
    if count <= width {
        return format!("{value:<width$}");
    }
    let truncated: String = value.chars().take(width.saturating_sub(1)).collect();
    format!("{truncated}…")
}
