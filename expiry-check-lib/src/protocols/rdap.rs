//! RDAP (Registration Data Access Protocol) lookups.
//!
//! RDAP answers are structured JSON; the expiry date is the `eventDate` of the
//! event whose `eventAction` is `expiration`.

use crate::error::ExpiryCheckError;
use crate::extract::parse_with_layouts;
use crate::protocols::registry::RdapRegistry;
use crate::utils::extract_tld;
use chrono::NaiveDate;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// RDAP client resolving a domain's expiration date.
#[derive(Clone)]
pub struct RdapClient {
    http_client: reqwest::Client,
    timeout: Duration,
    registry: Arc<RdapRegistry>,
}

impl RdapClient {
    /// Create a new RDAP client.
    pub fn new(timeout: Duration, registry: Arc<RdapRegistry>) -> Result<Self, ExpiryCheckError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(2)) // buffer over the request timeout
            .build()
            .map_err(|e| {
                ExpiryCheckError::network_with_source(
                    "Failed to create RDAP HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http_client,
            timeout,
            registry,
        })
    }

    /// Look up the expiration date of `domain`.
    ///
    /// # Errors
    ///
    /// Returns `ExpiryCheckError` if no endpoint is known for the TLD, the
    /// request fails or times out, or the response carries no usable
    /// `expiration` event.
    pub async fn expiration_date(&self, domain: &str) -> Result<NaiveDate, ExpiryCheckError> {
        let tld = extract_tld(domain)?;
        let endpoint = self.registry.endpoint_for(&tld).await?;
        let rdap_url = format!("{}{}", endpoint, domain);

        debug!(domain = %domain, url = %rdap_url, "rdap request");

        let json = match tokio::time::timeout(self.timeout, self.fetch(&rdap_url, domain)).await {
            Ok(result) => result?,
            Err(_) => return Err(ExpiryCheckError::timeout("RDAP request", self.timeout)),
        };

        let raw = extract_expiration_event(&json).ok_or_else(|| {
            ExpiryCheckError::rdap(domain, "Response has no expiration event")
        })?;

        parse_with_layouts(&raw).ok_or_else(|| {
            ExpiryCheckError::rdap(domain, format!("Unrecognized expiration date: {}", raw))
        })
    }

    /// GET the RDAP document, retrying once after 500ms when throttled.
    async fn fetch(&self, rdap_url: &str, domain: &str) -> Result<serde_json::Value, ExpiryCheckError> {
        let mut response = self.send(rdap_url).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            debug!(domain = %domain, "rdap rate limited, retrying after 500ms");
            tokio::time::sleep(Duration::from_millis(500)).await;
            response = self.send(rdap_url).await?;
        }

        match response.status() {
            StatusCode::OK => response.json::<serde_json::Value>().await.map_err(|e| {
                ExpiryCheckError::rdap(domain, format!("Failed to parse JSON: {}", e))
            }),
            StatusCode::NOT_FOUND => Err(ExpiryCheckError::rdap_with_status(
                domain,
                "Domain not found in RDAP registry",
                404,
            )),
            code => Err(ExpiryCheckError::rdap_with_status(
                domain,
                format!("RDAP server returned error: {}", code),
                code.as_u16(),
            )),
        }
    }

    async fn send(&self, rdap_url: &str) -> Result<reqwest::Response, ExpiryCheckError> {
        Ok(self.http_client.get(rdap_url).send().await?)
    }
}

/// The `eventDate` of the `expiration` event, if any.
pub fn extract_expiration_event(json: &serde_json::Value) -> Option<String> {
    json.get("events")?
        .as_array()?
        .iter()
        .find(|event| event.get("eventAction").and_then(|a| a.as_str()) == Some("expiration"))
        .and_then(|event| event.get("eventDate"))
        .and_then(|date| date.as_str())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rdap_client_creation() {
        let registry = Arc::new(RdapRegistry::new(false).unwrap());
        assert!(RdapClient::new(Duration::from_secs(3), registry).is_ok());
    }

    #[test]
    fn test_extract_expiration_event() {
        let json = serde_json::json!({
            "events": [
                {
                    "eventAction": "registration",
                    "eventDate": "1995-08-14T04:00:00Z"
                },
                {
                    "eventAction": "expiration",
                    "eventDate": "2025-08-13T04:00:00Z"
                }
            ],
            "status": ["client delete prohibited"]
        });

        let raw = extract_expiration_event(&json).unwrap();
        assert_eq!(raw, "2025-08-13T04:00:00Z");
        assert_eq!(
            parse_with_layouts(&raw),
            NaiveDate::from_ymd_opt(2025, 8, 13)
        );
    }

    #[test]
    fn test_missing_expiration_event() {
        let json = serde_json::json!({
            "events": [{ "eventAction": "last changed", "eventDate": "2020-01-01T00:00:00Z" }]
        });
        assert_eq!(extract_expiration_event(&json), None);
        assert_eq!(extract_expiration_event(&serde_json::json!({})), None);
    }

    #[tokio::test]
    async fn test_unknown_tld_fails_before_network() {
        let registry = Arc::new(RdapRegistry::new(false).unwrap());
        let client = RdapClient::new(Duration::from_secs(1), registry).unwrap();
        let result = client.expiration_date("example.unknowntld123").await;
        assert!(matches!(
            result,
            Err(ExpiryCheckError::BootstrapError { .. })
        ));
    }
}
