//! Memory taken by key names, per pattern.

use super::estimate::{min_max_avg, ratio, sds_alloc};
use super::Rule;
use crate::analysis::{floored_percentage, PatternBuckets};
use crate::error::Result;
use crate::models::{AnalysisTable, Cell};

pub const HEADERS: [&str; 10] = [
    "match", "count", "share", "percent", "useful", "real", "ratio", "min", "max", "avg",
];

/// Key-name sizes: raw bytes against allocator-rounded SDS bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyName;

impl KeyName {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for KeyName {
    fn name(&self) -> &'static str {
        "key-name"
    }

    fn analyze(&self, buckets: &PatternBuckets, total: usize, total_records: u64) -> Result<AnalysisTable> {
        let mut rows: Vec<(u64, Vec<Cell>)> = Vec::with_capacity(buckets.len());

        for bucket in buckets.iter() {
            let lengths: Vec<u64> = bucket.records.iter().map(|r| r.name.len() as u64).collect();
            let useful: u64 = lengths.iter().sum();
            let real: u64 = lengths.iter().map(|&len| sds_alloc(len)).sum();
            let (min, max, avg) = min_max_avg(&lengths);
            let count = bucket.len() as u64;

            rows.push((
                real,
                vec![
                    Cell::from(bucket.pattern.as_str()),
                    Cell::from(count),
                    Cell::Percent(floored_percentage(count, total as u64)),
                    Cell::Percent(floored_percentage(count, total_records)),
                    Cell::from(useful),
                    Cell::from(real),
                    Cell::from(ratio(real, useful)),
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
