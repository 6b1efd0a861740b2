//! Key record sources.
//!
//! A source is opened once per run and yields `(name, type)` records lazily.
//! The returned cursor owns whatever the source acquired; dropping it, after
//! exhaustion, an error or an early stop at the record limit, releases it.

use crate::error::Result;
use crate::models::{KeyRecord, KeyType};
use crate::progress;
use crate::store::RedisStore;
use indicatif::ProgressBar;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, warn};

/// Lazily produced, single-pass stream of records.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<KeyRecord>> + 'a>;

/// Anything that can enumerate keys matching a glob.
pub trait KeySource {
    /// Open a cursor over keys matching `match_pattern` whose type is in
    /// `accepted`. The caller enforces any record limit.
    fn open(&self, match_pattern: &str, accepted: &BTreeSet<KeyType>) -> Result<RecordStream<'_>>;
}

/// Configuration for store scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// `COUNT` hint passed to every `SCAN` call
    pub batch_size: usize,
    /// Show a spinner while scanning
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            show_progress: true,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            show_progress: true,
        }
    }
}

/// `SCAN`-based source over a live store.
pub struct Scanner<'s> {
    store: &'s RedisStore,
    config: ScanConfig,
}

impl<'s> Scanner<'s> {
    pub fn new(store: &'s RedisStore, config: ScanConfig) -> Self {
        Self { store, config }
    }
}

impl KeySource for Scanner<'_> {
    fn open(&self, match_pattern: &str, accepted: &BTreeSet<KeyType>) -> Result<RecordStream<'_>> {
        debug!(
            "Opening scan cursor on {} for '{}' ({} types)",
            self.store.target(),
            match_pattern,
            accepted.len()
        );

        Ok(Box::new(ScanCursor {
            store: self.store,
            pattern: match_pattern.to_string(),
            accepted: accepted.clone(),
            batch_size: self.config.batch_size,
            cursor: 0,
            buffer: VecDeque::new(),
            finished: false,
            pulled: 0,
            skipped: 0,
            progress: progress::scan_spinner(self.config.show_progress),
        }))
    }
}

struct ScanCursor<'s> {
    store: &'s RedisStore,
    pattern: String,
    accepted: BTreeSet<KeyType>,
    batch_size: usize,
    cursor: u64,
    buffer: VecDeque<KeyRecord>,
    finished: bool,
    pulled: u64,
    skipped: u64,
    progress: ProgressBar,
}

impl ScanCursor<'_> {
    /// Pull one `SCAN` page and keep the records of accepted types.
    fn fill(&mut self) -> Result<()> {
        let (next, names) = self
            .store
            .scan_batch(self.cursor, &self.pattern, self.batch_size)?;
        let types = self.store.types(&names)?;

        let (records, skipped) = accepted_records(names, types, &self.accepted);
        self.buffer.extend(records);
        self.skipped += skipped;

        self.cursor = next;
        if next == 0 {
            self.finished = true;
        }
        Ok(())
    }
}

impl Iterator for ScanCursor<'_> {
    type Item = Result<KeyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                self.pulled += 1;
                self.progress.inc(1);
                return Some(Ok(record));
            }

            if self.finished {
                return None;
            }

            if let Err(e) = self.fill() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

impl Drop for ScanCursor<'_> {
    fn drop(&mut self) {
        self.progress.finish_and_clear();
        if self.skipped > 0 {
            // store queries need the exact name, so these can't be sized
            warn!("Skipped {} keys whose names are not valid UTF-8", self.skipped);
        }
        debug!(
            "Scan cursor released after {} records (complete: {})",
            self.pulled, self.finished
        );
    }
}

/// Pair a page of raw names with their `TYPE` replies, keeping accepted
/// types. Returns the records and the number of names dropped for not being
/// valid UTF-8.
fn accepted_records(
    names: Vec<Vec<u8>>,
    types: Vec<String>,
    accepted: &BTreeSet<KeyType>,
) -> (Vec<KeyRecord>, u64) {
    let mut records = Vec::with_capacity(names.len());
    let mut skipped = 0;

    for (raw, type_reply) in names.into_iter().zip(types) {
        let Some(key_type) = KeyType::from_type_reply(&type_reply) else {
            continue;
        };
        if !accepted.contains(&key_type) {
            continue;
        }

        match String::from_utf8(raw) {
            Ok(name) => records.push(KeyRecord { name, key_type }),
            Err(e) => {
                debug!("Skipping non UTF-8 key {:?}", String::from_utf8_lossy(e.as_bytes()));
                skipped += 1;
            }
        }
    }

    (records, skipped)
}
