//! Core data types for expiry checking.
//!
//! This module defines the records flowing through a check pass, the pass
//! configuration, and the report returned to the caller.

use crate::error::ExpiryCheckError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default alert window applied when none (or zero) is configured.
pub const DEFAULT_ALERT_WITHIN: Duration = Duration::from_secs(24 * 3600);

/// A domain to be checked, as produced by a source loader.
///
/// `domain` together with `source` identifies the record in the expiry cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// The registrable name being checked (e.g., "example.com")
    pub domain: String,

    /// Account or origin the domain came from
    pub source: String,

    /// Known expiry date as `YYYY-MM-DD`, if the source already supplied one.
    /// On output records this always holds the canonical resolved date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
}

impl DomainRecord {
    /// Create a record without a known expiry date.
    pub fn new<D: Into<String>, S: Into<String>>(domain: D, source: S) -> Self {
        Self {
            domain: domain.into(),
            source: source.into(),
            expiry: None,
        }
    }

    /// Attach a known expiry date.
    pub fn with_expiry<E: Into<String>>(mut self, expiry: E) -> Self {
        self.expiry = Some(expiry.into());
        self
    }

    /// The trimmed explicit expiry, if one is present and non-empty.
    pub fn explicit_expiry(&self) -> Option<&str> {
        self.expiry
            .as_deref()
            .map(str::trim)
            .filter(|expiry| !expiry.is_empty())
    }
}

/// A domain for which no usable expiry could be obtained.
///
/// The reason is logged but never stored, so the failure file stays stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub domain: String,
    pub source: String,
}

impl FailureRecord {
    pub fn new<D: Into<String>, S: Into<String>>(domain: D, source: S) -> Self {
        Self {
            domain: domain.into(),
            source: source.into(),
        }
    }
}

/// Timing and window settings for a check pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConfig {
    /// A domain is "expiring" when its expiry is at most this far away.
    /// Zero means the 24h default.
    pub alert_within: Duration,

    /// Minimum spacing between network lookups. Zero disables pacing.
    pub rate_limit: Duration,

    /// Cap on a single lookup. Zero disables the cap.
    pub query_timeout: Duration,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            alert_within: DEFAULT_ALERT_WITHIN,
            rate_limit: Duration::from_secs(1),
            query_timeout: Duration::from_secs(15),
        }
    }
}

impl CheckConfig {
    /// Set the alert window.
    pub fn with_alert_within(mut self, alert_within: Duration) -> Self {
        self.alert_within = alert_within;
        self
    }

    /// Set the alert window in whole days.
    pub fn with_alert_days(self, days: u64) -> Self {
        self.with_alert_within(Duration::from_secs(days.saturating_mul(24 * 3600)))
    }

    /// Set the minimum spacing between lookups.
    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Set the per-lookup timeout.
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// The alert window with the zero-means-default rule applied.
    pub fn effective_alert_within(&self) -> Duration {
        if self.alert_within.is_zero() {
            DEFAULT_ALERT_WITHIN
        } else {
            self.alert_within
        }
    }
}

/// Output of a check pass, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Domains whose expiry falls inside the alert window
    pub expiring: Vec<DomainRecord>,

    /// Domains whose expiry could not be determined
    pub failures: Vec<FailureRecord>,

    /// Number of gateway lookups performed during the pass
    pub lookups: usize,

    /// Number of records answered from the cache without a lookup
    pub cache_hits: usize,
}

impl CheckReport {
    /// True when the pass found nothing to report.
    pub fn is_clean(&self) -> bool {
        self.expiring.is_empty() && self.failures.is_empty()
    }
}

/// A pass that stopped with an error, carrying whatever was accumulated.
#[derive(Debug, Clone)]
pub struct CheckAborted {
    /// Results gathered before the pass stopped
    pub partial: CheckReport,

    /// The condition that stopped the pass
    pub error: ExpiryCheckError,
}

impl CheckAborted {
    pub fn new(partial: CheckReport, error: ExpiryCheckError) -> Self {
        Self { partial, error }
    }

    /// Whether the pass was stopped by cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.error.is_cancellation()
    }
}

impl fmt::Display for CheckAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} expiring, {} failed before stop)",
            self.error,
            self.partial.expiring.len(),
            self.partial.failures.len()
        )
    }
}

impl std::error::Error for CheckAborted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<ExpiryCheckError> for CheckAborted {
    fn from(error: ExpiryCheckError) -> Self {
        Self::new(CheckReport::default(), error)
    }
}

/// Settings for the built-in RDAP + WHOIS gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupConfig {
    /// Query RDAP before WHOIS
    pub enable_rdap: bool,

    /// Fall back to the system `whois` command
    pub enable_whois: bool,

    /// Discover RDAP endpoints for unknown TLDs through IANA
    pub enable_bootstrap: bool,

    /// Timeout for a single RDAP request
    pub rdap_timeout: Duration,

    /// Timeout for a single WHOIS command
    pub whois_timeout: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enable_rdap: cfg!(feature = "rdap"),
            enable_whois: cfg!(feature = "whois"),
            enable_bootstrap: cfg!(feature = "bootstrap"),
            rdap_timeout: Duration::from_secs(5),
            whois_timeout: Duration::from_secs(10),
        }
    }
}

impl LookupConfig {
    /// Enable or disable RDAP.
    pub fn with_rdap(mut self, enabled: bool) -> Self {
        self.enable_rdap = enabled;
        self
    }

    /// Enable or disable the WHOIS fallback.
    pub fn with_whois(mut self, enabled: bool) -> Self {
        self.enable_whois = enabled;
        self
    }

    /// Enable or disable IANA bootstrap discovery.
    pub fn with_bootstrap(mut self, enabled: bool) -> Self {
        self.enable_bootstrap = enabled;
        self
    }
}
