//! Utility functions for domain processing and validation.
//!
//! Identity normalization lives here so that the pipeline and the cache store
//! agree on what "the same domain" means.

use crate::error::ExpiryCheckError;
use chrono::{DateTime, NaiveDate, Utc};

/// Normalize one part of a cache key: trim, lowercase, strip one trailing dot.
pub fn normalize_key(value: &str) -> String {
    let trimmed = value.trim().to_lowercase();
    match trimmed.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => trimmed,
    }
}

/// Build the cache identity for a (domain, source) pair.
pub fn cache_key(domain: &str, source: &str) -> String {
    format!("{}|{}", normalize_key(domain), normalize_key(source))
}

/// Validate a domain name before it is sent to a gateway.
///
/// This is a basic check only; registries reject anything stranger.
pub fn validate_domain(domain: &str) -> Result<(), ExpiryCheckError> {
    let domain = domain.trim();

    if domain.is_empty() {
        return Err(ExpiryCheckError::invalid_domain(
            domain,
            "Domain name cannot be empty",
        ));
    }

    if domain.contains(char::is_whitespace) || domain.contains('|') {
        return Err(ExpiryCheckError::invalid_domain(
            domain,
            "Domain name contains whitespace or a field separator",
        ));
    }

    Ok(())
}

/// Extract the TLD from a domain name.
///
/// "example.co.uk" yields "uk"; a name without a dot is an error.
pub fn extract_tld(domain: &str) -> Result<String, ExpiryCheckError> {
    let normalized = normalize_key(domain);
    match normalized.rsplit_once('.') {
        Some((_, tld)) if !tld.is_empty() => Ok(tld.to_string()),
        _ => Err(ExpiryCheckError::invalid_domain(
            domain,
            "Domain must contain at least one dot",
        )),
    }
}

/// Midnight UTC at the start of the given calendar date.
pub fn expiry_instant(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Whole days from `now` until the expiry date (negative once expired).
pub fn days_until_expiry(expiry: NaiveDate, now: DateTime<Utc>) -> i64 {
    (expiry_instant(expiry) - now).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Example.COM. "), "example.com");
        assert_eq!(normalize_key("example.com.."), "example.com.");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_cache_key_is_case_and_dot_insensitive() {
        assert_eq!(
            cache_key("Example.com.", " CF-Main "),
            cache_key("example.com", "cf-main")
        );
        assert_eq!(cache_key("a.com", "x"), "a.com|x");
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("").is_err());
        assert!(validate_domain("   ").is_err());
        assert!(validate_domain("exa mple.com").is_err());
        assert!(validate_domain("a|b.com").is_err());
    }

    #[test]
    fn test_extract_tld() {
        assert_eq!(extract_tld("example.com").unwrap(), "com");
        assert_eq!(extract_tld("Example.CO.UK.").unwrap(), "uk");
        assert!(extract_tld("localhost").is_err());
    }

    #[test]
    fn test_days_until_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let expiry = NaiveDate::from_ymd_opt(2026, 1, 11).unwrap();
        assert_eq!(days_until_expiry(expiry, now), 10);

        let past = NaiveDate::from_ymd_opt(2025, 12, 30).unwrap();
        assert_eq!(days_until_expiry(past, now), -2);
    }
}
