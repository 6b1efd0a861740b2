//! String values: payload bytes against encoding-aware allocation.

use super::estimate::{min_max_avg, ratio, string_value_size};
use super::{Rule, StoreHandle};
use crate::analysis::PatternBuckets;
use crate::error::Result;
use crate::models::{AnalysisTable, Cell, KeyType};
use std::collections::HashMap;
use tracing::debug;

pub const HEADERS: [&str; 9] = [
    "match", "count", "useful", "real", "ratio", "encoding", "min", "max", "avg",
];

pub struct ValueString {
    store: StoreHandle,
}

impl ValueString {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

impl Rule for ValueString {
    fn name(&self) -> &'static str {
        "value-string"
    }

    fn analyze(&self, buckets: &PatternBuckets, _total: usize, _total_records: u64) -> Result<AnalysisTable> {
        let mut rows: Vec<(u64, Vec<Cell>)> = Vec::with_capacity(buckets.len());

        for bucket in buckets.iter() {
            let keys: Vec<&str> = bucket.records.iter().map(|r| r.name.as_str()).collect();
            let lengths = self.store.lengths(KeyType::String, &keys)?;
            let encodings = self.store.encodings(&keys)?;

            let useful: u64 = lengths.iter().sum();
            let real: u64 = lengths
                .iter()
                .zip(&encodings)
                .map(|(&len, encoding)| string_value_size(len, encoding))
                .sum();
            let (min, max, avg) = min_max_avg(&lengths);
            debug!("{}: {} values, {} useful bytes", bucket.pattern, keys.len(), useful);

            rows.push((
                real,
                vec![
                    Cell::from(bucket.pattern.as_str()),
                    Cell::from(bucket.len()),
                    Cell::from(useful),
                    Cell::from(real),
                    Cell::from(ratio(real, useful)),
                    Cell::from(dominant_encodings(&encodings)),
                    Cell::from(min),
                    Cell::from(max),
                    Cell::from(avg),
                ],
            ));
        }

        rows.sort_by(|a, b| b.0.cmp(&a.0));

        let mut table = AnalysisTable::new(&HEADERS);
        for (_, row) in rows {
            table.push_row(row);
        }
        Ok(table)
    }
}

/// Encodings by frequency, most common first, ties by name.
pub fn dominant_encodings(encodings: &[String]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for encoding in encodings {
        *counts.entry(encoding.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .map(|(encoding, _)| encoding)
        .collect::<Vec<_>>()
        .join(",")
}
