//! Store-wide numbers shown ahead of the per-pattern tables.

use super::estimate::{jemalloc_size, DICT_ENTRY, ROBJ};
use super::{GlobalAnalyzer, StoreHandle};
use crate::error::Result;
use crate::models::{AnalysisTable, Cell};

pub const HEADERS: [&str; 2] = ["stat", "value"];

/// Compact-encoding thresholds worth showing next to the tables.
pub const THRESHOLDS: [&str; 6] = [
    "hash-max-ziplist-entries",
    "hash-max-ziplist-value",
    "list-max-ziplist-size",
    "set-max-intset-entries",
    "zset-max-ziplist-entries",
    "zset-max-ziplist-value",
];

const NOT_AVAILABLE: &str = "n/a";

pub struct GlobalKeySpace {
    store: StoreHandle,
}

impl GlobalKeySpace {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

impl GlobalAnalyzer for GlobalKeySpace {
    fn name(&self) -> &'static str {
        "keyspace"
    }

    fn analyze(&self) -> Result<AnalysisTable> {
        let server = self.store.info("server")?;
        let memory = self.store.info("memory")?;
        let total_keys = self.store.db_size()?;

        let field = |map: &std::collections::HashMap<String, String>, name: &str| {
            map.get(name)
                .cloned()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };

        let mut table = AnalysisTable::new(&HEADERS);
        let mut row = |stat: &str, value: Cell| table.push_row(vec![Cell::from(stat), value]);

        row("server version", Cell::from(field(&server, "redis_version")));
        row("total keys", Cell::from(total_keys));
        row("used memory", Cell::from(field(&memory, "used_memory")));
        row("used memory rss", Cell::from(field(&memory, "used_memory_rss")));
        row("fragmentation ratio", Cell::from(field(&memory, "mem_fragmentation_ratio")));
        row("keyspace overhead", Cell::from(keyspace_overhead(total_keys)));

        for parameter in THRESHOLDS {
            let value = self
                .store
                .config_get(parameter)?
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            row(parameter, Cell::from(value));
        }

        Ok(table)
    }
}

/// Main dictionary entries plus key `robj`s for `keys` keys.
pub fn keyspace_overhead(keys: u64) -> u64 {
    keys * (jemalloc_size(DICT_ENTRY) + jemalloc_size(ROBJ))
}
