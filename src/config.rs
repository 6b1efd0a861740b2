//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.kprof.toml` files.

use crate::analysis::AnalysisConfig;
use crate::models::{Behaviour, Filters};
use crate::store::ConnectionSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = ".kprof.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Where the store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub db: i64,

    /// Prefer the REDIS_PASSWORD env var over storing this in a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub ssl: bool,

    /// Connection timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db: 0,
            password: None,
            ssl: false,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_timeout() -> u64 {
    5
}

/// Key scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Glob passed to `SCAN MATCH`.
    #[serde(default = "default_match")]
    pub match_pattern: String,

    /// Maximum keys to scan, 0 for no limit.
    #[serde(default)]
    pub limit: usize,

    /// `COUNT` hint per `SCAN` call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Types to analyze; empty means all.
    #[serde(default)]
    pub types: Vec<String>,

    /// Phases to run.
    #[serde(default)]
    pub behaviour: Behaviour,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            match_pattern: default_match(),
            limit: 0,
            batch_size: default_batch_size(),
            types: Vec::new(),
            behaviour: Behaviour::All,
        }
    }
}

fn default_match() -> String {
    "*".to_string()
}

fn default_batch_size() -> usize {
    1000
}

/// Report settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Maximum rows per table, 0 for the built-in default of 100.
    #[serde(default)]
    pub report_limit: usize,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.connection.host = host.clone();
        }
        if let Some(port) = args.port {
            self.connection.port = port;
        }
        if let Some(db) = args.db {
            self.connection.db = db;
        }
        if let Some(ref password) = args.password {
            self.connection.password = Some(password.clone());
        }
        if let Some(timeout) = args.timeout {
            self.connection.timeout_seconds = timeout;
        }

        // Flags only ever switch on
        if args.ssl {
            self.connection.ssl = true;
        }

        if let Some(ref pattern) = args.match_pattern {
            self.scanner.match_pattern = pattern.clone();
        }
        if let Some(limit) = args.limit {
            self.scanner.limit = limit;
        }
        if let Some(ref types) = args.types {
            self.scanner.types = types.clone();
        }
        if let Some(behaviour) = args.behaviour {
            self.scanner.behaviour = behaviour;
        }

        if let Some(report_limit) = args.report_limit {
            self.report.report_limit = report_limit;
        }
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.connection.host.clone(),
            port: self.connection.port,
            db: self.connection.db,
            password: self.connection.password.clone(),
            ssl: self.connection.ssl,
            timeout: Duration::from_secs(self.connection.timeout_seconds.max(1)),
        }
    }

    pub fn analysis_config(&self, show_progress: bool) -> AnalysisConfig {
        AnalysisConfig {
            match_pattern: self.scanner.match_pattern.clone(),
            limit: self.scanner.limit,
            report_limit: self.report.report_limit,
            filters: Filters {
                types: Filters::types_from_names(&self.scanner.types),
                behaviour: self.scanner.behaviour,
            },
            show_progress,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
