//! # Expiry Check Library
//!
//! Rate-limited domain expiry checking with a persistent freshness cache.
//!
//! A pass takes a batch of domain records, skips those whose cached expiry is
//! comfortably in the future, looks the rest up one at a time (paced and
//! time-boxed), pulls the expiry date out of free-text registry responses, and
//! writes the expiring domains and the failures out through a repository.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use expiry_check_lib::{
//!     CancelSignal, CheckConfig, DomainRecord, ExpiryChecker, FileRepository, RegistryLookup,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = ExpiryChecker::builder()
//!         .config(CheckConfig::default())
//!         .gateway(Arc::new(RegistryLookup::new()?))
//!         .repository(Arc::new(FileRepository::new(
//!             "expiring_domains.txt",
//!             "failed_domains.txt",
//!             "domain_expiry_cache.txt",
//!         )))
//!         .build()?;
//!
//!     let report = checker
//!         .check(&CancelSignal::never(), vec![DomainRecord::new("example.com", "manual")])
//!         .await?;
//!     println!("{} expiring", report.expiring.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Expiry extraction**: label-anchored date parsing over raw WHOIS text
//! - **Freshness cache**: skip lookups for domains far from expiry
//! - **Pacing**: a minimum spacing between registry queries
//! - **RDAP + WHOIS**: built-in gateway with IANA bootstrap discovery

// Re-export main public API types and functions
pub use cache::ExpiryCacheStore;
pub use cancel::{CancelHandle, CancelSignal};
pub use checker::{Clock, ExpiryChecker, ExpiryCheckerBuilder, SystemClock};
pub use config::{
    env_config_from, load_env_config, merge_configs, parse_duration_string, ConfigManager,
    EnvConfig, FileConfig, StoragePaths,
};
pub use error::ExpiryCheckError;
pub use extract::{extract_expiry, format_date, parse_expiry_date, resolve_expiry_date};
pub use gateway::LookupGateway;
pub use persistence::{format_record_line, parse_record_line, ExpiryRepository, FileRepository};
pub use protocols::RegistryLookup;
pub use types::{
    CheckAborted, CheckConfig, CheckReport, DomainRecord, FailureRecord, LookupConfig,
    DEFAULT_ALERT_WITHIN,
};
pub use utils::{cache_key, days_until_expiry, expiry_instant, normalize_key, validate_domain};

// Public modules
pub mod config;
pub mod protocols;

// Internal modules - these are not part of the public API
mod cache;
mod cancel;
mod checker;
mod error;
mod extract;
mod gateway;
mod persistence;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ExpiryCheckError>;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
