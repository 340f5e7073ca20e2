//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files, reading `EC_*`
//! environment overrides, and merging both with proper precedence rules.

use crate::error::ExpiryCheckError;
use crate::persistence::FileRepository;
use crate::types::{CheckConfig, LookupConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default path of the expiring-domains output.
pub const DEFAULT_EXPIRING_FILE: &str = "expiring_domains.txt";

/// Default path of the failures output.
pub const DEFAULT_FAILURES_FILE: &str = "failed_domains.txt";

/// Default path of the expiry cache.
pub const DEFAULT_CACHE_FILE: &str = "domain_expiry_cache.txt";

/// Configuration loaded from TOML files.
///
/// Every field is optional so that several files can be layered.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Pass timing and alert window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckSection>,

    /// Built-in gateway settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<LookupSection>,

    /// Output and cache file locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSection>,
}

/// `[check]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckSection {
    /// Alert window in whole days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_days: Option<u64>,

    /// Alert window as a duration string ("36h", "7d")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_within: Option<String>,

    /// Minimum spacing between lookups ("1s", "500ms", "0" disables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,

    /// Upper bound for a single lookup ("15s", "0" disables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_timeout: Option<String>,
}

/// `[lookup]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LookupSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_timeout: Option<String>,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiring_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<String>,
}

/// Resolved file locations for [`FileRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub expiring_file: PathBuf,
    pub failures_file: PathBuf,
    pub cache_file: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self {
            expiring_file: PathBuf::from(DEFAULT_EXPIRING_FILE),
            failures_file: PathBuf::from(DEFAULT_FAILURES_FILE),
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
        }
    }
}

impl StoragePaths {
    /// Build the file-backed repository for these paths.
    pub fn repository(&self) -> FileRepository {
        FileRepository::new(
            self.expiring_file.clone(),
            self.failures_file.clone(),
            self.cache_file.clone(),
        )
    }
}

impl FileConfig {
    /// Apply the `[check]` section on top of `base`.
    pub fn apply_to_check(&self, base: CheckConfig) -> Result<CheckConfig, ExpiryCheckError> {
        let Some(check) = &self.check else {
            return Ok(base);
        };

        let mut config = base;
        if let Some(days) = check.alert_days {
            config = config.with_alert_days(days);
        }
        if let Some(window) = &check.alert_within {
            config = config.with_alert_within(require_duration("check.alert_within", window)?);
        }
        if let Some(rate_limit) = &check.rate_limit {
            config = config.with_rate_limit(require_duration("check.rate_limit", rate_limit)?);
        }
        if let Some(timeout) = &check.query_timeout {
            config = config.with_query_timeout(require_duration("check.query_timeout", timeout)?);
        }
        Ok(config)
    }

    /// Apply the `[lookup]` section on top of `base`.
    pub fn apply_to_lookup(&self, base: LookupConfig) -> Result<LookupConfig, ExpiryCheckError> {
        let Some(lookup) = &self.lookup else {
            return Ok(base);
        };

        let mut config = base;
        if let Some(rdap) = lookup.rdap {
            config.enable_rdap = rdap;
        }
        if let Some(whois) = lookup.whois {
            config.enable_whois = whois;
        }
        if let Some(bootstrap) = lookup.bootstrap {
            config.enable_bootstrap = bootstrap;
        }
        if let Some(timeout) = &lookup.rdap_timeout {
            config.rdap_timeout = require_duration("lookup.rdap_timeout", timeout)?;
        }
        if let Some(timeout) = &lookup.whois_timeout {
            config.whois_timeout = require_duration("lookup.whois_timeout", timeout)?;
        }
        Ok(config)
    }

    /// Apply the `[storage]` section on top of `base`.
    pub fn apply_to_storage(&self, base: StoragePaths) -> StoragePaths {
        let Some(storage) = &self.storage else {
            return base;
        };

        StoragePaths {
            expiring_file: storage
                .expiring_file
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(base.expiring_file),
            failures_file: storage
                .failures_file
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(base.failures_file),
            cache_file: storage
                .cache_file
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(base.cache_file),
        }
    }
}

/// Configuration discovery and loading functionality.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    home: Option<PathBuf>,
    xdg_config_home: Option<PathBuf>,
    working_dir: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a manager using `HOME`, `XDG_CONFIG_HOME` and the current directory.
    pub fn new() -> Self {
        Self {
            home: env::var_os("HOME").map(PathBuf::from),
            xdg_config_home: env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            working_dir: PathBuf::from("."),
        }
    }

    pub fn with_home<P: Into<PathBuf>>(mut self, home: Option<P>) -> Self {
        self.home = home.map(Into::into);
        self
    }

    pub fn with_xdg_config_home<P: Into<PathBuf>>(mut self, dir: Option<P>) -> Self {
        self.xdg_config_home = dir.map(Into::into);
        self
    }

    pub fn with_working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ExpiryCheckError::ConfigError` if the file is missing, is not
    /// valid TOML, or fails validation.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ExpiryCheckError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| {
            ExpiryCheckError::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            ExpiryCheckError::config(format!(
                "Failed to parse TOML configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;
        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config < global (`~/.expiry-check.toml`) < local
    /// (`./expiry-check.toml`). Missing files are skipped; a present but broken
    /// file is an error.
    pub fn discover_and_load(&self) -> Result<FileConfig, ExpiryCheckError> {
        let mut merged = FileConfig::default();

        for path in self.discovered_paths() {
            let config = self.load_file(&path)?;
            debug!(path = %path.display(), "configuration file loaded");
            merged = merge_configs(merged, config);
        }

        self.validate_config(&merged)?;
        Ok(merged)
    }

    /// Existing configuration files, lowest precedence first.
    pub fn discovered_paths(&self) -> Vec<PathBuf> {
        [
            self.xdg_config_path(),
            self.global_config_path(),
            self.local_config_path(),
        ]
        .into_iter()
        .flatten()
        .filter(|path| path.is_file())
        .collect()
    }

    fn local_config_path(&self) -> Option<PathBuf> {
        Some(self.working_dir.join("expiry-check.toml"))
    }

    fn global_config_path(&self) -> Option<PathBuf> {
        self.home
            .as_ref()
            .map(|home| home.join(".expiry-check.toml"))
    }

    /// Follows the XDG Base Directory Specification.
    fn xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = self
            .xdg_config_home
            .clone()
            .or_else(|| self.home.as_ref().map(|home| home.join(".config")))?;

        Some(config_dir.join("expiry-check").join("config.toml"))
    }

    /// Validate configuration values.
    fn validate_config(&self, config: &FileConfig) -> Result<(), ExpiryCheckError> {
        if let Some(check) = &config.check {
            if check.alert_days.is_some() && check.alert_within.is_some() {
                return Err(ExpiryCheckError::config(
                    "check.alert_days and check.alert_within are mutually exclusive",
                ));
            }

            let durations = [
                ("check.alert_within", &check.alert_within),
                ("check.rate_limit", &check.rate_limit),
                ("check.query_timeout", &check.query_timeout),
            ];
            for (key, value) in durations {
                if let Some(value) = value {
                    require_duration(key, value)?;
                }
            }
        }

        if let Some(lookup) = &config.lookup {
            if lookup.rdap == Some(false) && lookup.whois == Some(false) {
                return Err(ExpiryCheckError::config(
                    "lookup.rdap and lookup.whois cannot both be disabled",
                ));
            }

            let durations = [
                ("lookup.rdap_timeout", &lookup.rdap_timeout),
                ("lookup.whois_timeout", &lookup.whois_timeout),
            ];
            for (key, value) in durations {
                if let Some(value) = value {
                    require_duration(key, value)?;
                }
            }
        }

        if let Some(storage) = &config.storage {
            let paths = [
                ("storage.expiring_file", &storage.expiring_file),
                ("storage.failures_file", &storage.failures_file),
                ("storage.cache_file", &storage.cache_file),
            ];
            for (key, value) in paths {
                if matches!(value, Some(path) if path.trim().is_empty()) {
                    return Err(ExpiryCheckError::config(format!("{} cannot be empty", key)));
                }
            }
        }

        Ok(())
    }
}

/// Merge two configurations with proper precedence.
///
/// Values from `higher` take precedence over values from `lower`, field by
/// field. An alert window set in `higher` (in either form) replaces both forms
/// from `lower`.
pub fn merge_configs(lower: FileConfig, higher: FileConfig) -> FileConfig {
    FileConfig {
        check: match (lower.check, higher.check) {
            (Some(mut lower), Some(higher)) => {
                if higher.alert_days.is_some() || higher.alert_within.is_some() {
                    lower.alert_days = higher.alert_days;
                    lower.alert_within = higher.alert_within;
                }
                if higher.rate_limit.is_some() {
                    lower.rate_limit = higher.rate_limit;
                }
                if higher.query_timeout.is_some() {
                    lower.query_timeout = higher.query_timeout;
                }
                Some(lower)
            }
            (lower, higher) => higher.or(lower),
        },
        lookup: match (lower.lookup, higher.lookup) {
            (Some(mut lower), Some(higher)) => {
                if higher.rdap.is_some() {
                    lower.rdap = higher.rdap;
                }
                if higher.whois.is_some() {
                    lower.whois = higher.whois;
                }
                if higher.bootstrap.is_some() {
                    lower.bootstrap = higher.bootstrap;
                }
                if higher.rdap_timeout.is_some() {
                    lower.rdap_timeout = higher.rdap_timeout;
                }
                if higher.whois_timeout.is_some() {
                    lower.whois_timeout = higher.whois_timeout;
                }
                Some(lower)
            }
            (lower, higher) => higher.or(lower),
        },
        storage: match (lower.storage, higher.storage) {
            (Some(mut lower), Some(higher)) => {
                if higher.expiring_file.is_some() {
                    lower.expiring_file = higher.expiring_file;
                }
                if higher.failures_file.is_some() {
                    lower.failures_file = higher.failures_file;
                }
                if higher.cache_file.is_some() {
                    lower.cache_file = higher.cache_file;
                }
                Some(lower)
            }
            (lower, higher) => higher.or(lower),
        },
    }
}

/// Configuration taken from `EC_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub alert_days: Option<u64>,
    pub rate_limit: Option<Duration>,
    pub query_timeout: Option<Duration>,
    pub cache_file: Option<String>,
    pub expiring_file: Option<String>,
    pub failures_file: Option<String>,
}

impl EnvConfig {
    /// Apply environment overrides on top of `base`.
    pub fn apply_to_check(&self, base: CheckConfig) -> CheckConfig {
        let mut config = base;
        if let Some(days) = self.alert_days {
            config = config.with_alert_days(days);
        }
        if let Some(rate_limit) = self.rate_limit {
            config = config.with_rate_limit(rate_limit);
        }
        if let Some(timeout) = self.query_timeout {
            config = config.with_query_timeout(timeout);
        }
        config
    }

    /// Apply environment path overrides on top of `base`.
    pub fn apply_to_storage(&self, base: StoragePaths) -> StoragePaths {
        StoragePaths {
            expiring_file: self
                .expiring_file
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(base.expiring_file),
            failures_file: self
                .failures_file
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(base.failures_file),
            cache_file: self
                .cache_file
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(base.cache_file),
        }
    }
}

/// Load configuration from the process environment.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

/// Build an [`EnvConfig`] from an arbitrary variable lookup.
pub fn env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    if let Some(val) = lookup("EC_ALERT_DAYS") {
        match val.trim().parse::<u64>() {
            Ok(days) => env_config.alert_days = Some(days),
            Err(_) => warn!(value = %val, "invalid EC_ALERT_DAYS, expected whole days"),
        }
    }

    if let Some(val) = lookup("EC_RATE_LIMIT") {
        match parse_duration_string(&val) {
            Some(d) => env_config.rate_limit = Some(d),
            None => warn!(value = %val, "invalid EC_RATE_LIMIT, expected e.g. 1s or 500ms"),
        }
    }

    if let Some(val) = lookup("EC_QUERY_TIMEOUT") {
        match parse_duration_string(&val) {
            Some(d) => env_config.query_timeout = Some(d),
            None => warn!(value = %val, "invalid EC_QUERY_TIMEOUT, expected e.g. 15s or 2m"),
        }
    }

    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    env_config.cache_file = non_empty("EC_CACHE_FILE");
    env_config.expiring_file = non_empty("EC_EXPIRING_FILE");
    env_config.failures_file = non_empty("EC_FAILURES_FILE");

    env_config
}

/// Parse a duration string like "500ms", "5s", "2m", "24h", "30d".
///
/// A bare number is seconds. Returns `None` if parsing fails.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    }

    let (number, unit_secs) = match value.char_indices().last()? {
        (i, 's') => (&value[..i], 1),
        (i, 'm') => (&value[..i], 60),
        (i, 'h') => (&value[..i], 3600),
        (i, 'd') => (&value[..i], 24 * 3600),
        _ => (value.as_str(), 1),
    };

    number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit_secs))
        .map(Duration::from_secs)
}

fn require_duration(key: &str, value: &str) -> Result<Duration, ExpiryCheckError> {
    parse_duration_string(value).ok_or_else(|| {
        ExpiryCheckError::config(format!(
            "Invalid duration for {}: '{}'. Use formats like '500ms', '5s', '2m', '24h' or '30d'",
            key, value
        ))
    })
}
