//! Analysis modules.
//!
//! Pattern aggregation of key names and the orchestration of the analysis
//! phases that turn the aggregated buckets into a report.

pub mod aggregator;
pub mod canonical;
pub mod orchestrator;

pub use aggregator::{aggregate, classify, Bucket, BucketOrigin, PatternBuckets};
pub use orchestrator::{AnalysisConfig, Application, MergePolicy, OverwriteByType};

/// `count / total` as a percentage floored to two decimals.
///
/// A zero total yields `0.0`.
pub fn floored_percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((count as f64 / total as f64) * 10000.0).floor() / 100.0
}
