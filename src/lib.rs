//! kprof - keyspace memory profiler for Redis.
//!
//! Keys are pulled through a [`scanner::KeySource`], grouped into patterns
//! by [`analysis::aggregate`], and handed to the phases of
//! [`analysis::Application`]: global summaries, top patterns by count and
//! per-type memory rules. The merged [`models::Report`] is rendered by
//! [`report::render`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod progress;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod store;
