//! Registry protocols behind the default lookup gateway.

/// RDAP (Registration Data Access Protocol) client
pub mod rdap;

/// WHOIS via the system command
pub mod whois;

/// RDAP endpoint map and IANA bootstrap discovery
pub mod registry;

/// RDAP + WHOIS gateway
pub mod lookup;

pub use lookup::RegistryLookup;
pub use rdap::{extract_expiration_event, RdapClient};
pub use registry::{builtin_rdap_endpoints, RdapRegistry};
pub use whois::WhoisClient;
