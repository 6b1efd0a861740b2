//! Hash, list and set values: element counts and measured bytes.

use super::estimate::{element_overhead, jemalloc_size, min_max_avg, DICT_ENTRY, ROBJ};
use super::value_string::dominant_encodings;
use super::{Rule, StoreHandle};
use crate::analysis::PatternBuckets;
use crate::error::Result;
use crate::models::{AnalysisTable, Cell, KeyType};
use tracing::debug;

pub const HEADERS: [&str; 9] = [
    "match",
    "count",
    "elements",
    "avg elements",
    "min",
    "max",
    "encoding",
    "real",
    "avg real",
];

/// One rule per container type; the length command follows the type.
pub struct ContainerRule {
    key_type: KeyType,
    store: StoreHandle,
}

impl ContainerRule {
    pub fn new(key_type: KeyType, store: StoreHandle) -> Self {
        Self { key_type, store }
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Footprint from the element count when `MEMORY USAGE` is unavailable.
    fn estimate(&self, elements: u64, encoding: &str) -> u64 {
        let pairs = self.key_type == KeyType::Hash;
        jemalloc_size(ROBJ) + DICT_ENTRY + elements * element_overhead(encoding, pairs)
    }
}

impl Rule for ContainerRule {
    fn name(&self) -> &'static str {
        self.key_type.as_str()
    }

    fn analyze(&self, buckets: &PatternBuckets, _total: usize, _total_records: u64) -> Result<AnalysisTable> {
        let mut rows: Vec<(u64, Vec<Cell>)> = Vec::with_capacity(buckets.len());

        for bucket in buckets.iter() {
            let keys: Vec<&str> = bucket.records.iter().map(|r| r.name.as_str()).collect();
            let lengths = self.store.lengths(self.key_type, &keys)?;
            let encodings = self.store.encodings(&keys)?;
            let measured = self.store.memory_usage(&keys)?;

            let mut estimated = 0usize;
            let real: u64 = lengths
                .iter()
                .zip(&encodings)
                .zip(&measured)
                .map(|((&len, encoding), &bytes)| {
                    bytes.unwrap_or_else(|| {
                        estimated += 1;
                        self.estimate(len, encoding)
                    })
                })
                .sum();
            if estimated > 0 {
                debug!("{}: estimated {} of {} sizes", bucket.pattern, estimated, keys.len());
            }

            let elements: u64 = lengths.iter().sum();
            let (min, max, avg) = min_max_avg(&lengths);
            let count = bucket.len() as u64;
            let avg_real = if count == 0 {
                0.0
            } else {
                (real as f64 / count as f64 * 100.0).round() / 100.0
            };

            rows.push((
                real,
                vec![
                    Cell::from(bucket.pattern.as_str()),
                    Cell::from(count),
                    Cell::from(elements),
                    Cell::from(avg),
                    Cell::from(min),
                    Cell::from(max),
                    Cell::from(dominant_encodings(&encodings)),
                    Cell::from(real),
                    Cell::from(avg_real),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::models::KeyRecord;
    use crate::rules::testing::FakeStore;
    use std::rc::Rc;

    fn records(names: &[&str], key_type: KeyType) -> Vec<KeyRecord> {
        names.iter().map(|n| KeyRecord::new(*n, key_type)).collect()
    }

    #[test]
    fn test_measured_bytes_preferred() {
        let mut store = FakeStore::default();
        store.lengths.insert("user-ab12-profile".into(), 4);
        store.lengths.insert("user-cd34-profile".into(), 6);
        store.encodings.insert("user-ab12-profile".into(), "listpack".into());
        store.encodings.insert("user-cd34-profile".into(), "listpack".into());
        store.memory.insert("user-ab12-profile".into(), 100);
        store.memory.insert("user-cd34-profile".into(), 140);

        let buckets = aggregate(&records(&["user-ab12-profile", "user-cd34-profile"], KeyType::Hash));
        let rule = ContainerRule::new(KeyType::Hash, Rc::new(store));
        let table = rule.analyze(&buckets, 2, 2).unwrap();

        let profile = table
            .data
            .iter()
            .find(|r| r[0] == Cell::from("profile"))
            .unwrap();
        assert_eq!(profile[1], Cell::Int(2));
        assert_eq!(profile[2], Cell::Int(10));
        assert_eq!(profile[3], Cell::Float(5.0));
        assert_eq!(profile[6], Cell::from("listpack"));
        assert_eq!(profile[7], Cell::Int(240));
        assert_eq!(profile[8], Cell::Float(120.0));
    }

    #[test]
    fn test_estimate_when_memory_usage_missing() {
        let mut store = FakeStore::default();
        store.lengths.insert("tags".into(), 3);
        store.encodings.insert("tags".into(), "intset".into());

        let buckets = aggregate(&records(&["tags"], KeyType::Set));
        let rule = ContainerRule::new(KeyType::Set, Rc::new(store));
        let table = rule.analyze(&buckets, 1, 1).unwrap();

        // 16 + 24 + 3 * 8
        assert_eq!(table.data[0][7], Cell::Int(64));
    }

    #[test]
    fn test_rule_named_after_type() {
        let store: StoreHandle = Rc::new(FakeStore::default());
        assert_eq!(ContainerRule::new(KeyType::List, store.clone()).name(), "list");
        assert_eq!(ContainerRule::new(KeyType::Set, store).key_type(), KeyType::Set);
    }
}
