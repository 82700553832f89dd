//! Fetch adapter contracts and the shared timeout/retry wrapper
//!
//! The mapping core only talks to the outside world through these traits, so jobs
//! can run against the HTTP clients in [`crate::core::client`] or any other source.

use std::future::Future;

use crate::core::error::{Error, Result};
use crate::core::options::FetchPolicy;
use crate::core::position::LinkSequenceId;
use crate::core::route::{RoutePlan, RouteRequest};
use crate::core::segment::RawLinkSequence;
use crate::core::thematic::ThematicRecord;

/// Source of routing results
pub trait RouteFetcher {
    fn fetch_route(&self, request: &RouteRequest) -> impl Future<Output = Result<RoutePlan>> + Send;
}

/// Source of raw link-sequence records
pub trait SegmentFetcher {
    fn fetch_link_sequence(
        &self,
        id: LinkSequenceId,
    ) -> impl Future<Output = Result<RawLinkSequence>> + Send;
}

/// Source of thematic records for a `veglenkesekvens` filter
pub trait ThematicFetcher {
    fn fetch_records(
        &self,
        object_type: u32,
        filter: &str,
    ) -> impl Future<Output = Result<Vec<ThematicRecord>>> + Send;
}

/// Run `operation` under the policy's timeout, retrying transient failures
/// with exponential backoff.
pub async fn with_retry<F, Fut, T>(target: &str, policy: &FetchPolicy, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        let outcome = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(Error::transient(
                target,
                format!("timed out after {:?}", policy.timeout),
            )),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.retry.max_retries => {
                attempt += 1;
                let delay = policy.retry.delay(attempt);
                log::warn!("{e} (attempt {attempt}). Retrying in {delay:?}...");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
