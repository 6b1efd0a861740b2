//! Pattern aggregation of key names.
//!
//! Every key name runs through an ordered list of stages. Rewriting stages
//! mask the variable parts of the working name; tagging stages additionally
//! file the record under a side bucket. The record always ends up in the
//! bucket named by the fully rewritten name, so it lands in one to three
//! buckets and the buckets do not partition the input.

use super::canonical::canonicalize;
use crate::models::KeyRecord;
use indicatif::ProgressBar;
use regex::{Match, Regex};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::debug;

/// Alphanumeric runs, candidates for opaque-id masking.
static ALNUM_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z0-9]+").unwrap());

/// Leading `local@domain.tld` token followed by a hyphen.
static LEADING_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+?-").unwrap());

/// Franchise id candidates; only the left edge is bounded.
static FRANCHISE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{3,6}").unwrap());

/// Digit runs, candidates for channel masking.
static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Trailing hyphen-joined lowercase words. A single final newline is
/// tolerated after the suffix.
static TYPE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-([a-z]+(?:-[a-z]+)*)\n?\z").unwrap());

const MIN_OPAQUE_ID_LEN: usize = 7;

/// Which stage filed a record under a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketOrigin {
    /// Fully rewritten name
    Generic,
    /// `FRANCHISE-<digits>` side bucket
    Franchise,
    /// Trailing lowercase type suffix side bucket
    TypeSuffix,
}

/// One step of the normalization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Rewrite known `prefix-sep-suffix` conventions
    Canonicalize,
    /// Mixed letter/digit runs of 7+ chars at a name/hyphen boundary → `ID`
    OpaqueId,
    /// Leading e-mail token before a hyphen → `EMAIL`
    Email,
    /// First 3-6 digit run at a boundary is tagged; all of them → `FRANCHISEID`
    FranchiseId,
    /// Digit runs between two hyphens → `CHANNEL`
    Channel,
    /// Trailing lowercase words are tagged; the name is unchanged
    TypeSuffix,
}

/// The stages in the order they must run.
pub const PIPELINE: [Stage; 6] = [
    Stage::Canonicalize,
    Stage::OpaqueId,
    Stage::Email,
    Stage::FranchiseId,
    Stage::Channel,
    Stage::TypeSuffix,
];

/// What one stage did to the working name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutcome {
    /// Replacement working name, if the stage rewrote it.
    pub rewritten: Option<String>,
    /// Side bucket to file the original record under.
    pub tag: Option<(BucketOrigin, String)>,
}

impl Stage {
    /// Apply this stage to the working name.
    pub fn apply(&self, working: &str) -> StageOutcome {
        match self {
            Stage::Canonicalize => StageOutcome {
                rewritten: Some(canonicalize(working)),
                tag: None,
            },
            Stage::OpaqueId => StageOutcome {
                rewritten: Some(replace_runs(working, &ALNUM_RUN, "ID", |s, m| {
                    left_bounded(s, m) && is_opaque_id(m.as_str())
                })),
                tag: None,
            },
            Stage::Email => StageOutcome {
                rewritten: LEADING_EMAIL
                    .find(working)
                    .map(|m| format!("EMAIL{}", &working[m.end() - 1..])),
                tag: None,
            },
            Stage::FranchiseId => {
                let first = FRANCHISE_DIGITS
                    .find_iter(working)
                    .find(|m| left_bounded(working, m));
                match first {
                    Some(m) => StageOutcome {
                        rewritten: Some(replace_runs(
                            working,
                            &FRANCHISE_DIGITS,
                            "FRANCHISEID",
                            left_bounded,
                        )),
                        tag: Some((BucketOrigin::Franchise, format!("FRANCHISE-{}", m.as_str()))),
                    },
                    None => StageOutcome::default(),
                }
            }
            Stage::Channel => StageOutcome {
                rewritten: Some(replace_runs(working, &DIGIT_RUN, "CHANNEL", |s, m| {
                    m.start() > 0 && s.as_bytes()[m.start() - 1] == b'-' && right_bounded(s, m)
                })),
                tag: None,
            },
            Stage::TypeSuffix => StageOutcome {
                rewritten: None,
                tag: TYPE_SUFFIX
                    .captures(working)
                    .and_then(|c| c.get(1))
                    .map(|m| (BucketOrigin::TypeSuffix, m.as_str().to_string())),
            },
        }
    }
}

/// Bucket assignments for a single key name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Side buckets in the order their stages ran.
    pub side: Vec<(BucketOrigin, String)>,
    /// The fully rewritten name.
    pub generic: String,
}

impl Classification {
    /// Every bucket the record goes into, side buckets first.
    pub fn buckets(&self) -> impl Iterator<Item = (BucketOrigin, &str)> {
        self.side
            .iter()
            .map(|(origin, key)| (*origin, key.as_str()))
            .chain(std::iter::once((BucketOrigin::Generic, self.generic.as_str())))
    }
}

/// Run the whole pipeline over one name.
pub fn classify(name: &str) -> Classification {
    let mut working = name.to_string();
    let mut side = Vec::new();

    for stage in PIPELINE {
        let outcome = stage.apply(&working);
        if let Some(tag) = outcome.tag {
            side.push(tag);
        }
        if let Some(rewritten) = outcome.rewritten {
            working = rewritten;
        }
    }

    Classification {
        side,
        generic: working,
    }
}

fn left_bounded(s: &str, m: &Match<'_>) -> bool {
    m.start() == 0 || s.as_bytes()[m.start() - 1] == b'-'
}

fn right_bounded(s: &str, m: &Match<'_>) -> bool {
    s.as_bytes().get(m.end()) == Some(&b'-')
}

fn is_opaque_id(run: &str) -> bool {
    run.len() >= MIN_OPAQUE_ID_LEN
        && run.bytes().any(|b| b.is_ascii_digit())
        && run.bytes().any(|b| b.is_ascii_alphabetic())
}

/// Replace every match of `re` accepted by `eligible` with `token`.
fn replace_runs<F>(s: &str, re: &Regex, token: &str, eligible: F) -> String
where
    F: Fn(&str, &Match<'_>) -> bool,
{
    let mut out = String::with_capacity(s.len());
    let mut last = 0;

    for m in re.find_iter(s) {
        if eligible(s, &m) {
            out.push_str(&s[last..m.start()]);
            out.push_str(token);
            last = m.end();
        }
    }

    out.push_str(&s[last..]);
    out
}

/// A named group of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub pattern: String,
    /// Records in insertion order; the first one is the bucket's example.
    pub records: Vec<KeyRecord>,
    /// Stages that filed records here.
    pub origins: BTreeSet<BucketOrigin>,
}

impl Bucket {
    pub fn example(&self) -> Option<&KeyRecord> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Pattern → records, in order of first insertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternBuckets {
    buckets: Vec<Bucket>,
    index: HashMap<String, usize>,
}

impl PatternBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `record` under `pattern`. Nothing is deduplicated.
    pub fn insert(&mut self, pattern: &str, origin: BucketOrigin, record: KeyRecord) {
        let slot = match self.index.get(pattern) {
            Some(&slot) => slot,
            None => {
                self.buckets.push(Bucket {
                    pattern: pattern.to_string(),
                    records: Vec::new(),
                    origins: BTreeSet::new(),
                });
                self.index.insert(pattern.to_string(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };

        let bucket = &mut self.buckets[slot];
        if bucket.origins.insert(origin) && bucket.origins.len() > 1 {
            debug!(
                "Bucket '{}' is fed by several stages: {:?}",
                bucket.pattern, bucket.origins
            );
        }
        bucket.records.push(record);
    }

    pub fn get(&self, pattern: &str) -> Option<&Bucket> {
        self.index.get(pattern).map(|&slot| &self.buckets[slot])
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.index.contains_key(pattern)
    }

    /// Number of distinct patterns.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.pattern.as_str())
    }

    /// Sum of bucket sizes; at least the number of records aggregated.
    pub fn total_entries(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    /// Patterns that both a side-bucket stage and another stage wrote to.
    pub fn mixed_origin(&self) -> Vec<&str> {
        self.buckets
            .iter()
            .filter(|b| b.origins.len() > 1)
            .map(|b| b.pattern.as_str())
            .collect()
    }
}

/// Group records of one type by normalized name.
pub fn aggregate(records: &[KeyRecord]) -> PatternBuckets {
    aggregate_tracked(records, &ProgressBar::hidden())
}

/// [`aggregate`] that ticks `progress` once per record.
pub fn aggregate_tracked(records: &[KeyRecord], progress: &ProgressBar) -> PatternBuckets {
    let mut buckets = PatternBuckets::new();

    for record in records {
        let classification = classify(&record.name);
        for (origin, pattern) in classification.buckets() {
            buckets.insert(pattern, origin, record.clone());
        }
        progress.inc(1);
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyType;

    fn records(names: &[&str]) -> Vec<KeyRecord> {
        names
            .iter()
            .map(|n| KeyRecord::new(*n, KeyType::String))
            .collect()
    }

    fn bucket_names(names: &[&str]) -> Vec<String> {
        aggregate(&records(names)).patterns().map(String::from).collect()
    }

    const SEED: [&str; 8] = [
        "jimmy18ngo@gmail.com-*",
        "belgical@msn.com-*",
        "447486656-shipment-info",
        "elisabeth.amitsis@icloud.com-*-intelligence-orders",
        "60d380a28858772edcf4115b-*-cck-email",
        "75240560-shipment-info",
        "marie.menina17@gmail.com-*-*",
        "367568-*-productproperties",
    ];

    #[test]
    fn test_seed_names_produce_fourteen_buckets() {
        let buckets = aggregate(&records(&SEED));
        assert_eq!(buckets.len(), 14);
    }

    #[test]
    fn test_seed_bucket_contents() {
        let buckets = aggregate(&records(&SEED));

        let email = buckets.get("EMAIL-*").unwrap();
        assert_eq!(email.len(), 2);
        assert_eq!(email.example().unwrap().name, "jimmy18ngo@gmail.com-*");

        assert_eq!(buckets.get("shipment-info").unwrap().len(), 2);
        assert!(buckets.contains("FRANCHISE-447486"));
        assert!(buckets.contains("FRANCHISE-752405"));
        assert!(buckets.contains("FRANCHISEID656-shipment-info"));
        assert!(buckets.contains("FRANCHISEID60-shipment-info"));
        assert!(buckets.contains("ID-*-cck-email"));
        assert!(buckets.contains("cck-email"));
        assert!(buckets.contains("EMAIL-*-intelligence-orders"));
        assert!(buckets.contains("intelligence-orders"));
        assert!(buckets.contains("EMAIL-*-*"));
        assert!(buckets.contains("FRANCHISE-367568"));
        assert!(buckets.contains("FRANCHISEID-*-productproperties"));
        assert!(buckets.contains("productproperties"));
    }

    #[test]
    fn test_opaque_id_needs_letter_and_digit() {
        assert_eq!(classify("abc123d-x").generic, "ID-x");
        assert_eq!(classify("ab-abc1234").generic, "ab-ID");
        assert_eq!(classify("-abcdefg1").generic, "-ID");
        assert_eq!(classify("abcdefg").generic, "abcdefg");
        // too short
        assert_eq!(classify("x-1a2-b").generic, "x-1a2-b");
        // not at a boundary
        assert_eq!(classify("a.abc1234x").generic, "a.abc1234x");
    }

    #[test]
    fn test_email_masking() {
        assert_eq!(classify("john@x.org-12-orders").generic, "EMAIL-CHANNEL-orders");
        // greedy domain: the last dot before a hyphen wins
        assert_eq!(classify("a@b.c-d.e-f").generic, "EMAIL-f");
        // no hyphen after the address
        assert_eq!(classify("no.dash@here.com").generic, "no.dash@here.com");
    }

    #[test]
    fn test_franchise_side_bucket() {
        let c = classify("a-123-456");
        assert_eq!(c.generic, "a-FRANCHISEID-FRANCHISEID");
        assert_eq!(
            c.side,
            vec![(BucketOrigin::Franchise, "FRANCHISE-123".to_string())]
        );

        // only the left edge is bounded
        let c = classify("1234567");
        assert_eq!(c.generic, "FRANCHISEID7");
        assert_eq!(c.side[0].1, "FRANCHISE-123456");
    }

    #[test]
    fn test_channel_masking_shares_hyphens() {
        assert_eq!(classify("ID-1-2-3").generic, "ID-CHANNEL-CHANNEL-3");
        assert_eq!(classify("12-34-5").generic, "12-CHANNEL-5");
        assert_eq!(
            classify("user-42-7-profile").generic,
            "user-CHANNEL-CHANNEL-profile"
        );
    }

    #[test]
    fn test_type_suffix_side_bucket() {
        let c = classify("abc-def-ghi");
        assert_eq!(c.generic, "abc-def-ghi");
        assert_eq!(c.side, vec![(BucketOrigin::TypeSuffix, "def-ghi".to_string())]);

        let c = classify("abc-def\n");
        assert_eq!(c.side[0].1, "def");

        assert!(classify("abc-DEF").side.is_empty());
        assert!(classify("nohyphen").side.is_empty());
    }

    #[test]
    fn test_all_three_buckets() {
        let c = classify("foo-1234567-bar");
        assert_eq!(c.generic, "foo-FRANCHISEID7-bar");
        let all: Vec<_> = c.buckets().map(|(_, p)| p.to_string()).collect();
        assert_eq!(all, vec!["FRANCHISE-123456", "bar", "foo-FRANCHISEID7-bar"]);
    }

    #[test]
    fn test_canonicalized_names_are_masked() {
        assert_eq!(
            classify("celery-task-meta-8f2a9c1e-77aa-4bb1-9cde-0123456789ab").generic,
            "celery-task-meta:8f2a9c1e-77aa-4bb1-9cde-ID"
        );
        assert_eq!(
            classify("550e8400_trigger_queue_user_job").generic,
            "trigger_queue_user_job:550e8400"
        );
    }

    #[test]
    fn test_side_and_generic_keys_share_buckets() {
        // generic of the first record equals the type suffix of the second
        let buckets = aggregate(&records(&["shipment-info", "447486656-shipment-info"]));
        let shared = buckets.get("shipment-info").unwrap();
        assert_eq!(shared.len(), 2);
        assert_eq!(buckets.mixed_origin(), vec!["shipment-info"]);
    }

    #[test]
    fn test_insertion_order_and_totals() {
        let names = bucket_names(&["b-x", "a-y", "b-x"]);
        assert_eq!(names, vec!["x", "b-x", "y", "a-y"]);

        let buckets = aggregate(&records(&["plain", "other"]));
        assert_eq!(buckets.total_entries(), 2);
        assert!(buckets.mixed_origin().is_empty());
    }

    #[test]
    fn test_empty_name() {
        let buckets = aggregate(&records(&[""]));
        assert_eq!(buckets.len(), 1);
        assert!(buckets.contains(""));
    }
}
