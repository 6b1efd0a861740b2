//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Behaviour;
use clap::Parser;
use std::path::PathBuf;

/// kprof - keyspace memory profiler for Redis
///
/// Scans the keys of a Redis database, groups them into patterns by
/// masking their variable parts and reports which patterns hold the most
/// keys and the most memory.
///
/// Examples:
///   kprof --host 10.0.0.5 --port 6380
///   kprof --match 'session-*' --limit 100000 --types string,hash
///   kprof --behaviour scanner --format json --output keys.json
///   kprof --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Server host
    ///
    /// Default: from config or 127.0.0.1
    #[arg(short = 's', long, value_name = "HOST", env = "KPROF_HOST")]
    pub host: Option<String>,

    /// Server port
    ///
    /// Default: from config or 6379
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Database number
    #[arg(short, long, value_name = "DB")]
    pub db: Option<i64>,

    /// Password for AUTH
    #[arg(short = 'a', long, env = "REDIS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Connect over TLS
    #[arg(long)]
    pub ssl: bool,

    /// Glob pattern selecting the keys to scan
    ///
    /// Default: from config or '*'
    #[arg(short = 'm', long = "match", value_name = "GLOB")]
    pub match_pattern: Option<String>,

    /// Maximum number of keys to scan (0 = unbounded)
    #[arg(short, long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Maximum rows per report table (0 = 100)
    #[arg(long, value_name = "COUNT")]
    pub report_limit: Option<usize>,

    /// Key types to analyze (comma-separated)
    ///
    /// Example: --types string,hash. Unknown names are ignored.
    #[arg(short, long, value_name = "TYPES", value_delimiter = ',')]
    pub types: Option<Vec<String>>,

    /// Analysis phases to run (all, global, scanner, ram)
    #[arg(short, long, value_name = "BEHAVIOUR")]
    pub behaviour: Option<Behaviour>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .kprof.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress bars)
    #[arg(short, long)]
    pub quiet: bool,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Generate a default .kprof.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Fixed-width tables (default)
    #[default]
    Text,
    /// JSON object keyed by section
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(port) = self.port {
            if port == 0 {
                return Err("Port must be between 1 and 65535".to_string());
            }
        }

        if let Some(db) = self.db {
            if db < 0 {
                return Err("Database number cannot be negative".to_string());
            }
        }

        if let Some(ref pattern) = self.match_pattern {
            if pattern.is_empty() {
                return Err("Match pattern cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Progress bars are drawn only for interactive text output.
    pub fn show_progress(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            host: None,
            port: None,
            db: None,
            password: None,
            ssl: false,
            match_pattern: None,
            limit: None,
            report_limit: None,
            types: None,
            behaviour: None,
            format: OutputFormat::Text,
            output: None,
            config: None,
            verbose: false,
            quiet: false,
            timeout: None,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_defaults_ok() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.db = Some(-1);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.match_pattern = Some(String::new());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_progress_hidden_for_json_and_quiet() {
        let mut args = make_args();
        assert!(args.show_progress());

        args.format = OutputFormat::Json;
        assert!(!args.show_progress());

        args.format = OutputFormat::Text;
        args.quiet = true;
        assert!(!args.show_progress());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "kprof", "-s", "cache.local", "-p", "6380", "-m", "user:*", "-t", "string,hash", "-b",
            "ram", "-f", "json",
        ])
        .unwrap();

        assert_eq!(args.host.as_deref(), Some("cache.local"));
        assert_eq!(args.port, Some(6380));
        assert_eq!(args.match_pattern.as_deref(), Some("user:*"));
        assert_eq!(args.types, Some(vec!["string".to_string(), "hash".to_string()]));
        assert_eq!(args.behaviour, Some(Behaviour::Ram));
        assert_eq!(args.format, OutputFormat::Json);
    }
}
