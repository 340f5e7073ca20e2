//! Expiry Check CLI Application
//!
//! A command-line interface that runs one rate-limited expiry check pass over a
//! list of domains and reports the ones that are about to expire.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use expiry_check_lib::{
    load_env_config, parse_duration_string, parse_record_line, CancelHandle, CheckConfig,
    ConfigManager, DomainRecord, ExpiryChecker, LookupConfig, RegistryLookup, StoragePaths,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Exit code used when the pass was interrupted.
const EXIT_CANCELLED: i32 = 130;

/// CLI arguments for expiry-check
#[derive(Parser, Debug)]
#[command(name = "expiry-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find domains that are about to expire using RDAP with WHOIS fallback")]
#[command(
    long_about = "Run one rate-limited expiry check pass over a list of domains.\n\nDomains whose expiry is far away are answered from a local cache; the rest are looked up one at a time. Expiring domains and failures are written to files."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domains to check, as `domain` or `domain|source|expiry`
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Input file with one `domain[|source[|expiry]]` per line
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub file: Option<String>,

    /// Source label for records that do not name one
    #[arg(
        short = 's',
        long = "source",
        value_name = "NAME",
        default_value = "cli",
        help_heading = "Domain Selection"
    )]
    pub source: String,

    /// Alert window in days
    #[arg(
        long = "alert-days",
        value_name = "DAYS",
        conflicts_with = "alert_within",
        help_heading = "Check"
    )]
    pub alert_days: Option<u64>,

    /// Alert window as a duration (e.g. 36h, 7d)
    #[arg(long = "alert-within", value_name = "DURATION", help_heading = "Check")]
    pub alert_within: Option<String>,

    /// Minimum spacing between lookups (e.g. 1s, 500ms; 0 disables)
    #[arg(long = "rate-limit", value_name = "DURATION", help_heading = "Check")]
    pub rate_limit: Option<String>,

    /// Upper bound for a single lookup (e.g. 15s; 0 disables)
    #[arg(long = "query-timeout", value_name = "DURATION", help_heading = "Check")]
    pub query_timeout: Option<String>,

    /// Where to write expiring domains
    #[arg(long = "expiring-file", value_name = "FILE", help_heading = "Storage")]
    pub expiring_file: Option<PathBuf>,

    /// Where to write failed domains
    #[arg(long = "failures-file", value_name = "FILE", help_heading = "Storage")]
    pub failures_file: Option<PathBuf>,

    /// Expiry cache location
    #[arg(long = "cache-file", value_name = "FILE", help_heading = "Storage")]
    pub cache_file: Option<PathBuf>,

    /// Disable RDAP and use WHOIS only
    #[arg(long = "no-rdap", conflicts_with = "no_whois", help_heading = "Protocol")]
    pub no_rdap: bool,

    /// Disable automatic WHOIS fallback
    #[arg(long = "no-whois", help_heading = "Protocol")]
    pub no_whois: bool,

    /// Disable IANA bootstrap (use only hardcoded TLDs for RDAP)
    #[arg(long = "no-bootstrap", help_heading = "Protocol")]
    pub no_bootstrap: bool,

    /// Output the report in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug logs
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Everything a pass needs, after config files, environment and flags.
#[derive(Debug, Clone)]
struct Settings {
    check: CheckConfig,
    lookup: LookupConfig,
    storage: StoragePaths,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_tracing(&args);

    match run_expiry_check(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.domains.is_empty() && args.file.is_none() {
        return Err("You must specify domain names or a file with --file".to_string());
    }

    let durations = [
        ("--alert-within", &args.alert_within),
        ("--rate-limit", &args.rate_limit),
        ("--query-timeout", &args.query_timeout),
    ];
    for (flag, value) in durations {
        if let Some(value) = value {
            if parse_duration_string(value).is_none() {
                return Err(format!(
                    "Invalid duration for {}: '{}'. Use formats like '500ms', '5s', '2m', '24h' or '30d'",
                    flag, value
                ));
            }
        }
    }

    if args.source.trim().is_empty() {
        return Err("--source cannot be empty".to_string());
    }

    Ok(())
}

/// Install the log subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(args: &Args) {
    let default_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main expiry checking logic. Returns the process exit code.
async fn run_expiry_check(args: Args) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = build_settings(&args)?;
    let domains = collect_records(&args).await?;

    let gateway = RegistryLookup::with_config(settings.lookup.clone())?;
    let checker = ExpiryChecker::builder()
        .config(settings.check.clone())
        .gateway(Arc::new(gateway))
        .repository(Arc::new(settings.storage.repository()))
        .build()?;

    let (handle, signal) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling check pass");
            handle.cancel();
        }
    });

    if !args.json {
        ui::print_header(domains.len(), &settings.check, &settings.storage);
    }

    info!(domains = domains.len(), "starting check pass");
    let start_time = Instant::now();
    let outcome = checker.check(&signal, domains).await;
    let elapsed = start_time.elapsed();
    let now = chrono::Utc::now();

    match outcome {
        Ok(report) => {
            if args.json {
                ui::print_json(&report, now, false)?;
            } else {
                ui::print_report(&report, now);
                ui::print_summary(&report, elapsed, &settings.storage);
            }
            Ok(0)
        }
        Err(aborted) if aborted.is_cancelled() => {
            if args.json {
                ui::print_json(&aborted.partial, now, true)?;
            } else {
                ui::print_report(&aborted.partial, now);
            }
            eprintln!("Check cancelled: partial results shown, nothing was saved.");
            Ok(EXIT_CANCELLED)
        }
        Err(aborted) => {
            if !args.json {
                ui::print_report(&aborted.partial, now);
            }
            Err(aborted.error.into())
        }
    }
}

/// Resolve settings with precedence: defaults < config file < env < CLI flags.
fn build_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new();

    let file_config = match &args.config {
        Some(path) => {
            info!(path = %path, "using explicit config file");
            config_manager
                .load_file(path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?
        }
        None => config_manager.discover_and_load()?,
    };

    let check = file_config.apply_to_check(CheckConfig::default())?;
    let lookup = file_config.apply_to_lookup(LookupConfig::default())?;
    let storage = file_config.apply_to_storage(StoragePaths::default());

    let env_config = load_env_config();
    let check = env_config.apply_to_check(check);
    let storage = env_config.apply_to_storage(storage);

    Ok(apply_cli_args(
        Settings {
            check,
            lookup,
            storage,
        },
        args,
    ))
}

/// Apply CLI flags (highest precedence). Durations were checked in `validate_args`.
fn apply_cli_args(mut settings: Settings, args: &Args) -> Settings {
    let duration = |value: &Option<String>| -> Option<Duration> {
        value.as_deref().and_then(parse_duration_string)
    };

    if let Some(days) = args.alert_days {
        settings.check = settings.check.with_alert_days(days);
    }
    if let Some(window) = duration(&args.alert_within) {
        settings.check = settings.check.with_alert_within(window);
    }
    if let Some(rate_limit) = duration(&args.rate_limit) {
        settings.check = settings.check.with_rate_limit(rate_limit);
    }
    if let Some(timeout) = duration(&args.query_timeout) {
        settings.check = settings.check.with_query_timeout(timeout);
    }

    if args.no_rdap {
        settings.lookup.enable_rdap = false;
    }
    if args.no_whois {
        settings.lookup.enable_whois = false;
    }
    if args.no_bootstrap {
        settings.lookup.enable_bootstrap = false;
    }

    if let Some(path) = &args.expiring_file {
        settings.storage.expiring_file = path.clone();
    }
    if let Some(path) = &args.failures_file {
        settings.storage.failures_file = path.clone();
    }
    if let Some(path) = &args.cache_file {
        settings.storage.cache_file = path.clone();
    }

    settings
}

/// Gather records from positional arguments, then from `--file`.
async fn collect_records(args: &Args) -> Result<Vec<DomainRecord>, Box<dyn std::error::Error>> {
    let mut records: Vec<DomainRecord> = args
        .domains
        .iter()
        .filter_map(|arg| parse_record_line(arg, &args.source))
        .collect();

    if let Some(file_path) = &args.file {
        records.extend(read_records_from_file(file_path, &args.source).await?);
    }

    if records.is_empty() {
        return Err("No domains to check.".into());
    }

    Ok(records)
}

/// Read `domain|source|expiry` lines; blank lines and `#` comments are skipped.
async fn read_records_from_file(
    file_path: &str,
    default_source: &str,
) -> Result<Vec<DomainRecord>, Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|e| format!("Failed to read domain file '{}': {}", file_path, e))?;

    Ok(content
        .lines()
        .filter_map(|line| parse_record_line(line, default_source))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["expiry-check"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_validate_requires_input() {
        assert!(validate_args(&args(&[])).is_err());
        assert!(validate_args(&args(&["example.com"])).is_ok());
        assert!(validate_args(&args(&["--file", "domains.txt"])).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_durations() {
        assert!(validate_args(&args(&["example.com", "--rate-limit", "fast"])).is_err());
        assert!(validate_args(&args(&["example.com", "--query-timeout", "2m"])).is_ok());
    }

    #[test]
    fn test_alert_flags_conflict() {
        let result = Args::try_parse_from([
            "expiry-check",
            "example.com",
            "--alert-days",
            "3",
            "--alert-within",
            "36h",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_args_override_settings() {
        let settings = Settings {
            check: CheckConfig::default(),
            lookup: LookupConfig::default(),
            storage: StoragePaths::default(),
        };
        let args = args(&[
            "example.com",
            "--alert-days",
            "30",
            "--rate-limit",
            "0",
            "--no-whois",
            "--cache-file",
            "/tmp/c.txt",
        ]);

        let settings = apply_cli_args(settings, &args);
        assert_eq!(
            settings.check.alert_within,
            Duration::from_secs(30 * 24 * 3600)
        );
        assert_eq!(settings.check.rate_limit, Duration::ZERO);
        assert_eq!(settings.check.query_timeout, Duration::from_secs(15));
        assert!(!settings.lookup.enable_whois);
        assert_eq!(settings.storage.cache_file, PathBuf::from("/tmp/c.txt"));
    }

    #[tokio::test]
    async fn test_collect_records_from_args_and_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("domains.txt");
        std::fs::write(
            &file,
            "# account list\nfile.com|acct|2030-01-01\n\nplain.org\n",
        )
        .unwrap();

        let args = args(&[
            "arg.com",
            "pipe.net|cf",
            "--file",
            file.to_str().unwrap(),
            "--source",
            "manual",
        ]);
        let records = collect_records(&args).await.unwrap();

        assert_eq!(
            records,
            vec![
                DomainRecord::new("arg.com", "manual"),
                DomainRecord::new("pipe.net", "cf"),
                DomainRecord::new("file.com", "acct").with_expiry("2030-01-01"),
                DomainRecord::new("plain.org", "manual"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_domain_file_is_error() {
        let args = args(&["--file", "/definitely/not/here.txt"]);
        assert!(collect_records(&args).await.is_err());
    }
}
