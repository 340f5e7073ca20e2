//! The lookup seam between the pipeline and the network.

use crate::error::ExpiryCheckError;
use async_trait::async_trait;

/// Performs the actual WHOIS/RDAP query for one domain.
///
/// The returned text is either an already-normalized `YYYY-MM-DD` date or a
/// raw registry response to be run through the extractor.
///
/// There is no cancellation parameter. Dropping the returned future is the
/// cancellation: the pipeline drops it when the pass is cancelled or the query
/// timeout elapses. Implementations must therefore stop their work on drop
/// (e.g. `kill_on_drop` for child processes) and must not hold state that
/// breaks when dropped mid-flight.
#[async_trait]
pub trait LookupGateway: Send + Sync {
    async fn query(&self, domain: &str) -> Result<String, ExpiryCheckError>;
}
