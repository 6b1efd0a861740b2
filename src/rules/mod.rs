//! Analysis rules and the fixed registry that maps types to them.
//!
//! A rule turns the pattern buckets of one type into a table. Rules are
//! stateless apart from the store handle they were built with.

pub mod container;
pub mod estimate;
pub mod key_name;
pub mod keyspace;
pub mod value_string;

pub use container::ContainerRule;
pub use key_name::KeyName;
pub use keyspace::GlobalKeySpace;
pub use value_string::ValueString;

use crate::analysis::PatternBuckets;
use crate::error::Result;
use crate::models::{AnalysisTable, KeyType};
use crate::store::StoreProbe;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Shared handle to the store used for live sampling.
pub type StoreHandle = Rc<dyn StoreProbe>;

/// A per-type analyzer.
pub trait Rule {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Analyze the buckets of one type.
    ///
    /// `total` is the sum of bucket sizes for the type, `total_records` the
    /// store size capped by the record limit.
    fn analyze(&self, buckets: &PatternBuckets, total: usize, total_records: u64) -> Result<AnalysisTable>;
}

/// A store-wide summary independent of the scanned keys.
pub trait GlobalAnalyzer {
    fn name(&self) -> &'static str;

    fn analyze(&self) -> Result<AnalysisTable>;
}

/// Type → ordered rules.
#[derive(Default)]
pub struct RuleRegistry {
    rules: BTreeMap<KeyType, Vec<Box<dyn Rule>>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rule set used by the CLI.
    ///
    /// Every type gets the key-name rule first; string and container types
    /// then get their value rule.
    pub fn standard(store: StoreHandle) -> Self {
        let mut registry = Self::new();

        for key_type in KeyType::ALL {
            registry.register(key_type, Box::new(KeyName::new()));
        }
        registry.register(KeyType::String, Box::new(ValueString::new(store.clone())));
        registry.register(
            KeyType::Hash,
            Box::new(ContainerRule::new(KeyType::Hash, store.clone())),
        );
        registry.register(
            KeyType::List,
            Box::new(ContainerRule::new(KeyType::List, store.clone())),
        );
        registry.register(KeyType::Set, Box::new(ContainerRule::new(KeyType::Set, store)));

        registry
    }

    /// Append a rule after the ones already registered for `key_type`.
    pub fn register(&mut self, key_type: KeyType, rule: Box<dyn Rule>) {
        self.rules.entry(key_type).or_default().push(rule);
    }

    pub fn contains(&self, key_type: KeyType) -> bool {
        self.rules.contains_key(&key_type)
    }

    pub fn rules_for(&self, key_type: KeyType) -> &[Box<dyn Rule>] {
        self.rules.get(&key_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// The global analyzers used by the CLI.
pub fn standard_globals(store: StoreHandle) -> Vec<Box<dyn GlobalAnalyzer>> {
    vec![Box::new(GlobalKeySpace::new(store))]
}
