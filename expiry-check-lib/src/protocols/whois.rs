//! WHOIS lookups through the system `whois` command.
//!
//! WHOIS answers are unstructured text. This client returns the raw response
//! (line endings normalized) and leaves date extraction to the caller.

use crate::error::ExpiryCheckError;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// WHOIS client backed by the system's `whois` command-line tool.
#[derive(Clone)]
pub struct WhoisClient {
    timeout: Duration,
}

impl WhoisClient {
    /// Create a new WHOIS client with default settings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    /// Create a new WHOIS client with custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Query WHOIS for `domain` and return the raw response text.
    ///
    /// A throttled answer is retried once after one second.
    ///
    /// # Errors
    ///
    /// Returns `ExpiryCheckError` if the `whois` command cannot be run, the
    /// query times out, the answer is empty, or the registry does not serve
    /// the TLD.
    pub async fn query(&self, domain: &str) -> Result<String, ExpiryCheckError> {
        let response = match tokio::time::timeout(self.timeout, self.run_with_retry(domain)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(ExpiryCheckError::timeout("WHOIS query", self.timeout)),
        };

        if response.trim().is_empty() {
            return Err(ExpiryCheckError::whois(domain, "Empty WHOIS response"));
        }
        if is_unsupported_tld(&response) {
            return Err(ExpiryCheckError::whois(
                domain,
                "Invalid or unsupported TLD for WHOIS lookup",
            ));
        }

        Ok(response)
    }

    async fn run_with_retry(&self, domain: &str) -> Result<String, ExpiryCheckError> {
        let output = run_whois(domain).await?;
        if !is_rate_limited(&output) {
            return Ok(output);
        }

        debug!(domain = %domain, "whois rate limited, retrying after 1s");
        tokio::time::sleep(Duration::from_millis(1000)).await;
        run_whois(domain).await
    }
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_whois(domain: &str) -> Result<String, ExpiryCheckError> {
    let output = Command::new("whois")
        .arg(domain)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            ExpiryCheckError::whois(
                domain,
                format!(
                    "Failed to execute whois command: {}. Make sure 'whois' is installed.",
                    e
                ),
            )
        })?;

    Ok(normalize_response(&String::from_utf8_lossy(&output.stdout)))
}

/// CRLF and bare CR become LF.
pub fn normalize_response(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// Check if the WHOIS output indicates rate limiting.
pub fn is_rate_limited(output: &str) -> bool {
    let output_lower = output.to_lowercase();
    let rate_limit_patterns = [
        "rate limit exceeded",
        "too many requests",
        "try again later",
        "quota exceeded",
        "limit exceeded",
        "throttled",
        "rate-limited",
    ];

    rate_limit_patterns
        .iter()
        .any(|pattern| output_lower.contains(pattern))
}

fn is_unsupported_tld(output: &str) -> bool {
    let output_lower = output.to_lowercase();
    let invalid_tld_patterns = [
        "no whois server is known",
        "no whois server",
        "invalid tld",
        "unknown tld",
        "tld not found",
        "no such tld",
    ];

    invalid_tld_patterns
        .iter()
        .any(|pattern| output_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        assert!(is_rate_limited("Rate limit exceeded. Try again later."));
        assert!(is_rate_limited("Too many requests from your IP."));
        assert!(!is_rate_limited("Normal whois response"));
    }

    #[test]
    fn test_unsupported_tld_detection() {
        assert!(is_unsupported_tld("No whois server is known for this kind of object."));
        assert!(!is_unsupported_tld("Registry Expiry Date: 2030-01-01"));
    }

    #[test]
    fn test_normalize_response() {
        assert_eq!(normalize_response("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_whois_client_creation() {
        let client = WhoisClient::new();
        assert_eq!(client.timeout, Duration::from_secs(10));

        let custom_client = WhoisClient::with_timeout(Duration::from_secs(3));
        assert_eq!(custom_client.timeout, Duration::from_secs(3));
    }
}
