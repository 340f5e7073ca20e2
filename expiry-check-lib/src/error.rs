//! Error handling for expiry checking operations.
//!
//! This module defines the error type shared by the pipeline, its collaborators
//! and the configuration layer. Per-domain failures (lookup, extraction) are
//! normally turned into failure records by the pipeline; only cancellation,
//! configuration and persistence errors reach the caller.

use std::fmt;
use std::time::Duration;

/// Main error type for expiry checking operations.
#[derive(Debug, Clone)]
pub enum ExpiryCheckError {
    /// A required collaborator was not supplied
    MissingDependency { name: String },

    /// Configuration errors (invalid settings, unparsable durations, etc.)
    ConfigError { message: String },

    /// Invalid domain name format
    InvalidDomain { domain: String, reason: String },

    /// Generic lookup failure reported by a gateway
    LookupFailed { domain: String, message: String },

    /// RDAP protocol specific errors
    RdapError {
        domain: String,
        message: String,
        status_code: Option<u16>,
    },

    /// WHOIS protocol specific errors
    WhoisError { domain: String, message: String },

    /// Bootstrap registry lookup failures
    BootstrapError { tld: String, message: String },

    /// No confident expiry date could be derived
    ExtractionFailed { domain: String, message: String },

    /// Timeout errors when operations take too long
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The pass was cancelled while pacing or while a lookup was in flight
    Cancelled { during: String },

    /// Reading or writing a backing file failed
    PersistenceError { path: String, message: String },

    /// Network-related errors (connection refused, TLS, ...)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl ExpiryCheckError {
    /// Create a missing-dependency error for the named collaborator.
    pub fn missing_dependency<N: Into<String>>(name: N) -> Self {
        Self::MissingDependency { name: name.into() }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new generic lookup error.
    pub fn lookup<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::LookupFailed {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new RDAP error.
    pub fn rdap<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::RdapError {
            domain: domain.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new RDAP error with HTTP status code.
    pub fn rdap_with_status<D: Into<String>, M: Into<String>>(
        domain: D,
        message: M,
        status_code: u16,
    ) -> Self {
        Self::RdapError {
            domain: domain.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a new WHOIS error.
    pub fn whois<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::WhoisError {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new bootstrap error.
    pub fn bootstrap<T: Into<String>, M: Into<String>>(tld: T, message: M) -> Self {
        Self::BootstrapError {
            tld: tld.into(),
            message: message.into(),
        }
    }

    /// Create a new extraction error.
    pub fn extraction<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::ExtractionFailed {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new cancellation error.
    pub fn cancelled<D: Into<String>>(during: D) -> Self {
        Self::Cancelled {
            during: during.into(),
        }
    }

    /// Create a new persistence error.
    pub fn persistence<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::PersistenceError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error is the pass-level cancellation condition.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl fmt::Display for ExpiryCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDependency { name } => {
                write!(f, "Missing dependency: {} is not configured", name)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::LookupFailed { domain, message } => {
                write!(f, "Lookup failed for '{}': {}", domain, message)
            }
            Self::RdapError {
                domain,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "RDAP error for '{}' (HTTP {}): {}", domain, code, message)
                } else {
                    write!(f, "RDAP error for '{}': {}", domain, message)
                }
            }
            Self::WhoisError { domain, message } => {
                write!(f, "WHOIS error for '{}': {}", domain, message)
            }
            Self::BootstrapError { tld, message } => {
                write!(f, "Bootstrap error for TLD '{}': {}", tld, message)
            }
            Self::ExtractionFailed { domain, message } => {
                write!(f, "No expiry date for '{}': {}", domain, message)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::Cancelled { during } => {
                write!(f, "Check pass cancelled during {}", during)
            }
            Self::PersistenceError { path, message } => {
                write!(f, "Persistence error at '{}': {}", path, message)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for ExpiryCheckError {}

impl From<reqwest::Error> for ExpiryCheckError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("HTTP request", Duration::from_secs(30))
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_names_domain() {
        let err = ExpiryCheckError::extraction("a.com", "no date");
        assert_eq!(err.to_string(), "No expiry date for 'a.com': no date");
        assert!(!err.is_cancellation());
    }

    #[test]
    fn test_display_messages() {
        let err = ExpiryCheckError::missing_dependency("lookup gateway");
        assert_eq!(
            err.to_string(),
            "Missing dependency: lookup gateway is not configured"
        );

        let err = ExpiryCheckError::rdap_with_status("example.com", "server error", 502);
        assert_eq!(
            err.to_string(),
            "RDAP error for 'example.com' (HTTP 502): server error"
        );

        assert!(ExpiryCheckError::cancelled("pacing wait").is_cancellation());
    }
}
