//! Fixed-width text rendering.

use super::ReportHeader;
use crate::models::{AnalysisTable, Cell, Report, Section};

/// Render the report for a terminal.
pub fn render_text(report: &Report, header: &ReportHeader, limit: usize) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Keyspace report for {} generated {}\n",
        header.target,
        header.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
        "{} records analyzed in {:.1}s\n\n",
        report.records, header.duration_seconds
    ));

    for (index, section) in report.sections.iter().enumerate() {
        match section {
            Section::Nodes(nodes) => {
                for table in nodes {
                    output.push_str(&format_table("Globals", table, usize::MAX));
                }
            }
            Section::Keys(table) => {
                output.push_str(&format_table("Top patterns", table, limit));
            }
            Section::Stat(stat) => {
                for (key_type, table) in stat {
                    output.push_str(&format_table(key_type.as_str(), table, limit));
                }
            }
            Section::Other(value) => {
                output.push_str(&format!("Unsupported section {}\n", index));
                output.push_str(&serde_json::to_string_pretty(value).unwrap_or_default());
                output.push_str("\n\n");
            }
        }
    }

    output
}

/// A titled table; each column is as wide as its widest cell.
pub fn format_table(title: &str, table: &AnalysisTable, limit: usize) -> String {
    let rows: Vec<Vec<String>> = table
        .data
        .iter()
        .take(limit)
        .map(|row| row.iter().map(Cell::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut section = String::new();
    section.push_str(title);
    section.push('\n');
    section.push_str(&format_line(&table.headers, &widths));
    section.push_str(&format_line(
        &widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>(),
        &widths,
    ));
    for row in &rows {
        section.push_str(&format_line(row, &widths));
    }
    if rows.is_empty() {
        section.push_str("(empty)\n");
    }
    section.push('\n');

    section
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    format!("{}\n", line.trim_end())
}
