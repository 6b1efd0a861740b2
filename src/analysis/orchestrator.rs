//! Drives one analysis run: fetch, partition, aggregate, then the phases.

use super::aggregator::{aggregate_tracked, PatternBuckets};
use super::floored_percentage;
use crate::models::{AnalysisTable, Cell, Filters, KeyRecord, KeyType, Report, Section};
use crate::progress;
use crate::rules::{GlobalAnalyzer, RuleRegistry};
use crate::scanner::KeySource;
use crate::store::StoreProbe;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Row ceiling used when the configured report limit is 0.
pub const DEFAULT_REPORT_LIMIT: usize = 100;

/// Headers of the top-pattern table.
pub const KEYS_HEADERS: [&str; 5] = ["name", "count", "type", "percent", "example"];

/// Per-run options consumed by the orchestrator.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Glob passed to the key source.
    pub match_pattern: String,
    /// Maximum records pulled from the source; 0 means unbounded.
    pub limit: usize,
    /// Maximum rows per table; 0 means [`DEFAULT_REPORT_LIMIT`].
    pub report_limit: usize,
    /// Type and phase selection.
    pub filters: Filters,
    /// Show aggregation progress bars.
    pub show_progress: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            match_pattern: "*".to_string(),
            limit: 0,
            report_limit: 0,
            filters: Filters::default(),
            show_progress: false,
        }
    }
}

impl AnalysisConfig {
    pub fn record_limit(&self) -> Option<usize> {
        (self.limit != 0).then_some(self.limit)
    }

    pub fn effective_report_limit(&self) -> usize {
        if self.report_limit == 0 {
            DEFAULT_REPORT_LIMIT
        } else {
            self.report_limit
        }
    }

    /// Denominator for percentages: the store size capped by the record limit.
    pub fn total_records(&self, store_size: u64) -> u64 {
        match self.record_limit() {
            Some(limit) => store_size.min(limit as u64),
            None => store_size,
        }
    }
}

/// How a rule's table is combined with what earlier rules of the same type
/// produced.
pub trait MergePolicy {
    fn merge(&self, stat: &mut BTreeMap<KeyType, AnalysisTable>, key_type: KeyType, table: AnalysisTable);
}

/// The last rule registered for a type wins; earlier tables are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverwriteByType;

impl MergePolicy for OverwriteByType {
    fn merge(&self, stat: &mut BTreeMap<KeyType, AnalysisTable>, key_type: KeyType, table: AnalysisTable) {
        if stat.insert(key_type, table).is_some() {
            debug!("Replaced earlier {} table", key_type);
        }
    }
}

/// The analysis pipeline. Holds no state between runs.
pub struct Application {
    config: AnalysisConfig,
    registry: RuleRegistry,
    globals: Vec<Box<dyn GlobalAnalyzer>>,
    merge: Box<dyn MergePolicy>,
}

impl Application {
    pub fn new(
        config: AnalysisConfig,
        registry: RuleRegistry,
        globals: Vec<Box<dyn GlobalAnalyzer>>,
    ) -> Self {
        Self {
            config,
            registry,
            globals,
            merge: Box::new(OverwriteByType),
        }
    }

    /// Replace the default [`OverwriteByType`] policy.
    pub fn with_merge_policy(mut self, merge: Box<dyn MergePolicy>) -> Self {
        self.merge = merge;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every phase selected by the behaviour filter.
    pub fn run(&self, source: &dyn KeySource, probe: &dyn StoreProbe) -> Result<Report> {
        let types = self.collect(source)?;
        info!("Found types: {:?}", types.keys().collect::<Vec<_>>());

        let mut report = Report::new();
        report.records = types.values().map(Vec::len).sum();

        info!("Aggregating keys by pattern and type");
        let keys = self.aggregate_types(&types);

        let behaviour = self.config.filters.behaviour;

        if behaviour.runs_global() {
            info!("Processing globals");
            report.push(self.do_globals()?);
        }

        if behaviour.runs_scanner() || behaviour.runs_ram() {
            let store_size = probe.db_size().context("Failed to read store size")?;
            let total = self.config.total_records(store_size);

            if behaviour.runs_scanner() {
                info!("Processing scanner");
                report.push(self.do_scanner(&keys, total));
            }
            if behaviour.runs_ram() {
                info!("Processing ram");
                report.push(self.do_ram(&keys, total)?);
            }
        }

        Ok(report)
    }

    /// Pull at most `limit` records and partition them by type.
    ///
    /// The cursor is dropped before returning, on success and on error.
    pub fn collect(&self, source: &dyn KeySource) -> Result<BTreeMap<KeyType, Vec<KeyRecord>>> {
        let cursor = source
            .open(&self.config.match_pattern, &self.config.filters.types)
            .context("Failed to open key source")?;
        let limit = self.config.record_limit().unwrap_or(usize::MAX);

        let mut types: BTreeMap<KeyType, Vec<KeyRecord>> = BTreeMap::new();
        let mut found = 0usize;
        for record in cursor.take(limit) {
            let record = record.context("Failed while scanning keys")?;
            types.entry(record.key_type).or_default().push(record);
            found += 1;
        }

        info!("Found {} records", found);
        Ok(types)
    }

    /// Aggregate every present type into pattern buckets.
    pub fn aggregate_types(
        &self,
        types: &BTreeMap<KeyType, Vec<KeyRecord>>,
    ) -> BTreeMap<KeyType, PatternBuckets> {
        types
            .iter()
            .map(|(key_type, records)| {
                let pb = progress::work_bar(
                    records.len() as u64,
                    key_type.as_str(),
                    self.config.show_progress,
                );
                let buckets = aggregate_tracked(records, &pb);
                pb.finish_and_clear();
                debug!(
                    "{}: {} records in {} patterns",
                    key_type,
                    records.len(),
                    buckets.len()
                );
                (*key_type, buckets)
            })
            .collect()
    }

    fn do_globals(&self) -> Result<Section> {
        let nodes = self
            .globals
            .iter()
            .map(|g| {
                g.analyze()
                    .with_context(|| format!("Global analyzer {} failed", g.name()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Section::Nodes(nodes))
    }

    /// Top patterns across all types by record count.
    pub fn do_scanner(&self, keys: &BTreeMap<KeyType, PatternBuckets>, total: u64) -> Section {
        let mut rows: Vec<(usize, Vec<Cell>)> = Vec::new();

        for (key_type, buckets) in keys {
            info!("Processing type {}", key_type);
            for bucket in buckets.iter() {
                let count = bucket.len();
                let example = bucket
                    .example()
                    .map(|r| r.name.clone())
                    .unwrap_or_default();
                rows.push((
                    count,
                    vec![
                        Cell::from(bucket.pattern.as_str()),
                        Cell::from(count),
                        Cell::from(key_type.as_str()),
                        Cell::Percent(floored_percentage(count as u64, total)),
                        Cell::from(example),
                    ],
                ));
            }
            info!("Done processing type {}", key_type);
        }

        rows.sort_by(|a, b| b.0.cmp(&a.0));
        rows.truncate(self.config.effective_report_limit());

        let mut table = AnalysisTable::new(&KEYS_HEADERS);
        for (_, row) in rows {
            table.push_row(row);
        }
        Section::Keys(table)
    }

    /// Per-type rules; the merge policy decides what survives per type.
    pub fn do_ram(&self, keys: &BTreeMap<KeyType, PatternBuckets>, total_records: u64) -> Result<Section> {
        let mut stat = BTreeMap::new();
        let limit = self.config.effective_report_limit();

        for (key_type, buckets) in keys {
            if !self.registry.contains(*key_type) || !self.config.filters.accepts(*key_type) {
                debug!("No rules for {}", key_type);
                continue;
            }

            info!("Processing type {}", key_type);
            let total_keys = buckets.total_entries();
            for rule in self.registry.rules_for(*key_type) {
                let mut table = rule
                    .analyze(buckets, total_keys, total_records)
                    .with_context(|| format!("Rule {} failed for {}", rule.name(), key_type))?;
                table.truncate(limit);
                self.merge.merge(&mut stat, *key_type, table);
            }
        }

        Ok(Section::Stat(stat))
    }
}
