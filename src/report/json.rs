//! JSON rendering.

use crate::models::{AnalysisTable, Cell, Report, Section};
use anyhow::Result;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Render the report as JSON with sorted keys and four-space indent.
///
/// `nodes` keeps the `{headers, data}` shape; `keys` and `stat` rows become
/// objects keyed by header. Sections without a layout are emitted under
/// `unsupported<index>`.
pub fn render_json(report: &Report, limit: usize) -> Result<String> {
    let mut out: BTreeMap<String, Value> = BTreeMap::new();

    for (index, section) in report.sections.iter().enumerate() {
        match section {
            Section::Nodes(nodes) => {
                out.insert("nodes".to_string(), serde_json::to_value(nodes)?);
            }
            Section::Keys(table) => {
                out.insert("keys".to_string(), rows_as_objects(table, limit));
            }
            Section::Stat(stat) => {
                let by_type: Map<String, Value> = stat
                    .iter()
                    .map(|(key_type, table)| (key_type.to_string(), rows_as_objects(table, limit)))
                    .collect();
                out.insert("stat".to_string(), Value::Object(by_type));
            }
            Section::Other(value) => {
                out.insert(format!("unsupported{}", index), value.clone());
            }
        }
    }

    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    out.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf)?)
}

/// At most `limit` rows, each zipped with the headers.
fn rows_as_objects(table: &AnalysisTable, limit: usize) -> Value {
    let rows = table
        .data
        .iter()
        .take(limit)
        .map(|row| {
            let object: Map<String, Value> = table
                .headers
                .iter()
                .cloned()
                .zip(row.iter().map(cell_value))
                .collect();
            Value::Object(object)
        })
        .collect();

    Value::Array(rows)
}

fn cell_value(cell: &Cell) -> Value {
    match cell {
        Cell::Int(v) => Value::from(*v),
        Cell::Float(v) | Cell::Percent(v) => Value::from(*v),
        Cell::Text(s) => Value::String(s.clone()),
    }
}
