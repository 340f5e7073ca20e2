//! The default lookup gateway: RDAP first, WHOIS as fallback.

use crate::error::ExpiryCheckError;
use crate::extract::format_date;
use crate::gateway::LookupGateway;
use crate::protocols::rdap::RdapClient;
use crate::protocols::registry::RdapRegistry;
use crate::protocols::whois::WhoisClient;
use crate::types::LookupConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Queries registries over the network.
///
/// RDAP answers are returned as a normalized `YYYY-MM-DD` date. On any RDAP
/// miss the system `whois` command is tried and its raw text is returned for
/// the pipeline to extract from.
#[derive(Clone)]
pub struct RegistryLookup {
    config: LookupConfig,
    rdap: RdapClient,
    whois: WhoisClient,
}

impl RegistryLookup {
    /// Create a gateway with default settings.
    pub fn new() -> Result<Self, ExpiryCheckError> {
        Self::with_config(LookupConfig::default())
    }

    /// Create a gateway with custom settings.
    ///
    /// # Errors
    ///
    /// Returns `ExpiryCheckError` if both protocols are disabled or the HTTP
    /// client cannot be built.
    pub fn with_config(config: LookupConfig) -> Result<Self, ExpiryCheckError> {
        if !config.enable_rdap && !config.enable_whois {
            return Err(ExpiryCheckError::config(
                "At least one of RDAP or WHOIS must be enabled",
            ));
        }

        let registry = Arc::new(RdapRegistry::new(config.enable_bootstrap)?);
        let rdap = RdapClient::new(config.rdap_timeout, registry)?;
        let whois = WhoisClient::with_timeout(config.whois_timeout);

        Ok(Self {
            config,
            rdap,
            whois,
        })
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }
}

#[async_trait]
impl LookupGateway for RegistryLookup {
    async fn query(&self, domain: &str) -> Result<String, ExpiryCheckError> {
        if self.config.enable_rdap {
            match self.rdap.expiration_date(domain).await {
                Ok(date) => return Ok(format_date(date)),
                Err(e) if !self.config.enable_whois => {
                    return Err(ExpiryCheckError::lookup(domain, e.to_string()))
                }
                Err(e) => debug!(domain = %domain, error = %e, "rdap miss, falling back to whois"),
            }
        }

        self.whois
            .query(domain)
            .await
            .map_err(|e| ExpiryCheckError::lookup(domain, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_a_protocol() {
        let config = LookupConfig::default().with_rdap(false).with_whois(false);
        assert!(matches!(
            RegistryLookup::with_config(config),
            Err(ExpiryCheckError::ConfigError { .. })
        ));
    }

    #[tokio::test]
    async fn test_rdap_only_reports_lookup_failure() {
        let config = LookupConfig::default()
            .with_whois(false)
            .with_bootstrap(false);
        let gateway = RegistryLookup::with_config(config).unwrap();

        let result = gateway.query("example.unknowntld123").await;
        assert!(matches!(
            result,
            Err(ExpiryCheckError::LookupFailed { .. })
        ));
    }
}
