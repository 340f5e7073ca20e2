//! RDAP endpoint discovery.
//!
//! Endpoints come from a built-in TLD map first, then from the IANA bootstrap
//! registry. Bootstrap results live inside each [`RdapRegistry`] instance, so
//! two gateways never share discovery state.

use crate::error::ExpiryCheckError;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// IANA RDAP bootstrap file for DNS.
pub const BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

/// Bootstrap cache TTL: 24 hours (RDAP endpoints rarely change)
const BOOTSTRAP_TTL: Duration = Duration::from_secs(24 * 3600);

/// Endpoints discovered through the bootstrap registry.
#[derive(Debug, Default)]
struct BootstrapCache {
    /// TLD -> RDAP endpoint URL
    endpoints: HashMap<String, String>,
    /// TLDs known to have no RDAP endpoint
    no_rdap: HashSet<String>,
    last_fetch: Option<Instant>,
}

impl BootstrapCache {
    fn is_stale(&self) -> bool {
        match self.last_fetch {
            Some(t) => t.elapsed() > BOOTSTRAP_TTL,
            None => true,
        }
    }
}

/// Built-in RDAP endpoints for common TLDs.
pub fn builtin_rdap_endpoints() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("com", "https://rdap.verisign.com/com/v1/domain/"),
        ("net", "https://rdap.verisign.com/net/v1/domain/"),
        (
            "org",
            "https://rdap.publicinterestregistry.org/rdap/domain/",
        ),
        ("info", "https://rdap.identitydigital.services/rdap/domain/"),
        ("biz", "https://rdap.nic.biz/domain/"),
        ("app", "https://pubapi.registry.google/rdap/domain/"),
        ("dev", "https://pubapi.registry.google/rdap/domain/"),
        ("page", "https://pubapi.registry.google/rdap/domain/"),
        ("xyz", "https://rdap.centralnic.com/xyz/domain/"),
        ("tech", "https://rdap.centralnic.com/tech/domain/"),
        ("online", "https://rdap.centralnic.com/online/domain/"),
        ("site", "https://rdap.centralnic.com/site/domain/"),
        ("shop", "https://rdap.gmoregistry.net/rdap/domain/"),
        ("ai", "https://rdap.identitydigital.services/rdap/domain/"),
        ("io", "https://rdap.identitydigital.services/rdap/domain/"),
        ("me", "https://rdap.identitydigital.services/rdap/domain/"),
        ("us", "https://rdap.nic.us/domain/"),
        ("uk", "https://rdap.nominet.uk/domain/"),
        ("de", "https://rdap.denic.de/domain/"),
        ("ca", "https://rdap.ca.fury.ca/rdap/domain/"),
        ("au", "https://rdap.cctld.au/rdap/domain/"),
        ("fr", "https://rdap.nic.fr/domain/"),
        ("nl", "https://rdap.sidn.nl/domain/"),
        ("br", "https://rdap.registro.br/domain/"),
        ("in", "https://rdap.nixiregistry.in/rdap/domain/"),
        ("tv", "https://rdap.nic.tv/domain/"),
        ("cc", "https://tld-rdap.verisign.com/cc/v1/domain/"),
        // co, eu, it, jp, es, cn have no working RDAP service; WHOIS covers them.
    ])
}

/// Parse the IANA bootstrap JSON into a TLD -> endpoint map.
pub fn parse_bootstrap_services(
    json: &serde_json::Value,
) -> Result<HashMap<String, String>, ExpiryCheckError> {
    let services = json
        .get("services")
        .and_then(|s| s.as_array())
        .ok_or_else(|| {
            ExpiryCheckError::bootstrap(
                "*",
                "Invalid bootstrap JSON: missing or invalid 'services' array",
            )
        })?;

    let mut endpoints = HashMap::new();
    for service in services.iter().filter_map(|s| s.as_array()) {
        if service.len() < 2 {
            continue;
        }
        let Some(url) = service[1]
            .as_array()
            .and_then(|urls| urls.first())
            .and_then(|u| u.as_str())
        else {
            continue;
        };
        let endpoint = format!("{}/domain/", url.trim_end_matches('/'));

        for tld in service[0].as_array().into_iter().flatten() {
            if let Some(tld) = tld.as_str() {
                endpoints.insert(tld.to_lowercase(), endpoint.clone());
            }
        }
    }

    Ok(endpoints)
}

/// Resolves RDAP endpoints for TLDs.
#[derive(Debug)]
pub struct RdapRegistry {
    http_client: reqwest::Client,
    use_bootstrap: bool,
    cache: Mutex<BootstrapCache>,
}

impl RdapRegistry {
    /// Create a registry. Without bootstrap only built-in TLDs resolve.
    pub fn new(use_bootstrap: bool) -> Result<Self, ExpiryCheckError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ExpiryCheckError::network_with_source("Failed to create HTTP client", e.to_string())
            })?;

        Ok(Self {
            http_client,
            use_bootstrap,
            cache: Mutex::new(BootstrapCache::default()),
        })
    }

    /// Get the RDAP endpoint for a TLD.
    ///
    /// Lookup order: built-in map, fresh bootstrap entries, negative cache,
    /// then (if enabled) a bootstrap fetch. A TLD still unknown after a fetch
    /// is remembered as having no RDAP until the next refresh.
    pub async fn endpoint_for(&self, tld: &str) -> Result<String, ExpiryCheckError> {
        let tld = tld.to_lowercase();

        if let Some(endpoint) = builtin_rdap_endpoints().get(tld.as_str()) {
            return Ok(endpoint.to_string());
        }

        let needs_fetch = {
            let cache = self.lock()?;
            if !cache.is_stale() {
                if let Some(endpoint) = cache.endpoints.get(&tld) {
                    return Ok(endpoint.clone());
                }
                if cache.no_rdap.contains(&tld) {
                    return Err(ExpiryCheckError::bootstrap(
                        &tld,
                        "TLD has no known RDAP endpoint",
                    ));
                }
            }
            cache.is_stale()
        };

        if !self.use_bootstrap {
            return Err(ExpiryCheckError::bootstrap(
                &tld,
                "No known RDAP endpoint and bootstrap disabled",
            ));
        }

        if needs_fetch {
            let endpoints = self.fetch_bootstrap().await?;
            self.store_bootstrap(endpoints)?;
        }

        let mut cache = self.lock()?;
        if let Some(endpoint) = cache.endpoints.get(&tld) {
            return Ok(endpoint.clone());
        }
        cache.no_rdap.insert(tld.clone());

        Err(ExpiryCheckError::bootstrap(
            &tld,
            "TLD not found in IANA bootstrap registry",
        ))
    }

    /// Replace the bootstrap entries and reset the negative cache.
    pub fn store_bootstrap(&self, endpoints: HashMap<String, String>) -> Result<(), ExpiryCheckError> {
        let mut cache = self.lock()?;
        debug!(tlds = endpoints.len(), "rdap bootstrap refreshed");
        cache.endpoints = endpoints;
        cache.no_rdap.clear();
        cache.last_fetch = Some(Instant::now());
        Ok(())
    }

    /// Number of bootstrap entries and whether they are stale.
    pub fn bootstrap_stats(&self) -> Result<(usize, bool), ExpiryCheckError> {
        let cache = self.lock()?;
        Ok((cache.endpoints.len(), cache.is_stale()))
    }

    async fn fetch_bootstrap(&self) -> Result<HashMap<String, String>, ExpiryCheckError> {
        let response = self
            .http_client
            .get(BOOTSTRAP_URL)
            .send()
            .await
            .map_err(|e| {
                ExpiryCheckError::bootstrap("*", format!("Failed to fetch bootstrap registry: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ExpiryCheckError::bootstrap(
                "*",
                format!("Bootstrap registry returned HTTP {}", response.status()),
            ));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            ExpiryCheckError::bootstrap("*", format!("Failed to parse bootstrap JSON: {}", e))
        })?;

        parse_bootstrap_services(&json)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BootstrapCache>, ExpiryCheckError> {
        self.cache
            .lock()
            .map_err(|_| ExpiryCheckError::internal("Failed to acquire bootstrap cache lock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_endpoints_are_https() {
        let registry = builtin_rdap_endpoints();
        assert!(registry.contains_key("com"));
        for (tld, endpoint) in &registry {
            assert!(
                endpoint.starts_with("https://") && endpoint.ends_with("/domain/"),
                "bad endpoint for '{}': {}",
                tld,
                endpoint
            );
        }
    }

    #[tokio::test]
    async fn test_builtin_lookup_is_case_insensitive() {
        let registry = RdapRegistry::new(false).unwrap();
        let endpoint = registry.endpoint_for("COM").await.unwrap();
        assert!(endpoint.contains("verisign.com"));
    }

    #[tokio::test]
    async fn test_unknown_tld_without_bootstrap() {
        let registry = RdapRegistry::new(false).unwrap();
        let result = registry.endpoint_for("unknowntld123").await;
        assert!(matches!(
            result,
            Err(ExpiryCheckError::BootstrapError { .. })
        ));
    }

    #[tokio::test]
    async fn test_stored_bootstrap_entries_resolve() {
        let registry = RdapRegistry::new(true).unwrap();
        registry
            .store_bootstrap(HashMap::from([(
                "example".to_string(),
                "https://rdap.example/domain/".to_string(),
            )]))
            .unwrap();

        assert_eq!(
            registry.endpoint_for("example").await.unwrap(),
            "https://rdap.example/domain/"
        );

        // Fresh bootstrap without the TLD: negative answer, no fetch.
        assert!(registry.endpoint_for("missing").await.is_err());
        assert_eq!(registry.bootstrap_stats().unwrap(), (1, false));
    }

    #[test]
    fn test_registries_do_not_share_state() {
        let first = RdapRegistry::new(true).unwrap();
        let second = RdapRegistry::new(true).unwrap();
        first
            .store_bootstrap(HashMap::from([("a".to_string(), "https://a/domain/".to_string())]))
            .unwrap();

        assert_eq!(first.bootstrap_stats().unwrap().0, 1);
        assert_eq!(second.bootstrap_stats().unwrap(), (0, true));
    }

    #[test]
    fn test_parse_bootstrap_services() {
        let json = serde_json::json!({
            "version": "1.0",
            "services": [
                [["Bar", "baz"], ["https://rdap.bar.example/"]],
                [["qux"], ["https://rdap.qux.example"]],
                [["broken"]]
            ]
        });

        let endpoints = parse_bootstrap_services(&json).unwrap();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints["bar"], "https://rdap.bar.example/domain/");
        assert_eq!(endpoints["qux"], "https://rdap.qux.example/domain/");

        assert!(parse_bootstrap_services(&serde_json::json!({})).is_err());
    }
}
