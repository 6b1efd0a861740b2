//! Report rendering.
//!
//! The analysis produces a [`Report`]; this module turns it into either a
//! fixed-width text document or pretty-printed JSON. Both renderers apply
//! the row limit to the `keys` table and to every `stat` table.

pub mod json;
pub mod text;

pub use json::render_json;
pub use text::render_text;

use crate::cli::OutputFormat;
use crate::models::Report;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;

/// Run details printed above the text report.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    /// `host:port/db`
    pub target: String,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl ReportHeader {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            generated_at: Utc::now(),
            duration_seconds: 0.0,
        }
    }
}

/// Render in the requested format.
pub fn render(report: &Report, header: &ReportHeader, format: OutputFormat, limit: usize) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report, header, limit)),
        OutputFormat::Json => render_json(report, limit),
    }
}

/// Write rendered output to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
