//! kprof - keyspace memory profiler for Redis
//!
//! Scans a database, groups keys into patterns and reports where the keys
//! and the memory go.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, unsupported server, etc.)

use anyhow::{Context, Result};
use kprof::analysis::Application;
use kprof::cli::{Args, OutputFormat};
use kprof::config::{Config, DEFAULT_CONFIG_FILE};
use kprof::report::{self, ReportHeader};
use kprof::rules::{self, RuleRegistry, StoreHandle};
use kprof::scanner::{ScanConfig, Scanner};
use kprof::store::{RedisStore, StoreProbe};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("kprof v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_profile(args) {
        error!("Profiling failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .kprof.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so a report on stdout stays clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Connect, analyze and write the report.
fn run_profile(args: Args) -> Result<()> {
    let start_time = Instant::now();
    let text_mode = args.format == OutputFormat::Text;

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let settings = config.connection_settings();
    let store = Rc::new(RedisStore::connect(&settings)?);
    let handle: StoreHandle = store.clone();

    let analysis = config.analysis_config(args.show_progress());
    let limit = analysis.effective_report_limit();
    let app = Application::new(
        analysis,
        RuleRegistry::standard(handle.clone()),
        rules::standard_globals(handle),
    );

    let scan_config = ScanConfig {
        show_progress: args.show_progress(),
        ..ScanConfig::from(&config.scanner)
    };
    let scanner = Scanner::new(&store, scan_config);

    if text_mode && !args.quiet {
        eprintln!("Scanning {} matching '{}'", store.target(), config.scanner.match_pattern);
    }
    let probe: &dyn StoreProbe = &*store;
    let report = app.run(&scanner, probe)?;

    if report.records == 0 {
        warn!("No keys matched '{}'", config.scanner.match_pattern);
    }

    let header = ReportHeader {
        duration_seconds: start_time.elapsed().as_secs_f64(),
        ..ReportHeader::new(store.target())
    };

    info!("Printing results");
    let output = report::render(&report, &header, args.format, limit)?;

    match args.output {
        Some(ref path) => {
            report::write_report(&output, path)?;
            if text_mode && !args.quiet {
                eprintln!("Report saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
