#![allow(dead_code)]

pub mod source;

use kprof::error::Result;
use kprof::models::{KeyRecord, KeyType};
use kprof::store::StoreProbe;
use std::cell::Cell;
use std::collections::HashMap;

pub use source::{glob_match, MemorySource};

pub const SEED_KEYS: &str = include_str!("../../fixtures/seed_keys.txt");

pub fn seed_names() -> Vec<&'static str> {
    SEED_KEYS.lines().filter(|l| !l.is_empty()).collect()
}

pub fn records(names: &[&str], key_type: KeyType) -> Vec<KeyRecord> {
    names.iter().map(|n| KeyRecord::new(*n, key_type)).collect()
}

/// Store probe answering from fixed values and counting `DBSIZE` calls.
#[derive(Debug, Default)]
pub struct FakeProbe {
    pub size: u64,
    pub db_size_calls: Cell<usize>,
}

impl FakeProbe {
    pub fn with_size(size: u64) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

impl StoreProbe for FakeProbe {
    fn db_size(&self) -> Result<u64> {
        self.db_size_calls.set(self.db_size_calls.get() + 1);
        Ok(self.size)
    }

    fn info(&self, _section: &str) -> Result<HashMap<String, String>> {
        Ok(HashMap::from([
            ("redis_version".to_string(), "7.2.4".to_string()),
            ("used_memory".to_string(), "1048576".to_string()),
        ]))
    }

    fn config_get(&self, _parameter: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn lengths(&self, _key_type: KeyType, keys: &[&str]) -> Result<Vec<u64>> {
        Ok(keys.iter().map(|k| k.len() as u64).collect())
    }

    fn encodings(&self, keys: &[&str]) -> Result<Vec<String>> {
        Ok(vec!["listpack".to_string(); keys.len()])
    }

    fn memory_usage(&self, keys: &[&str]) -> Result<Vec<Option<u64>>> {
        Ok(vec![None; keys.len()])
    }
}
