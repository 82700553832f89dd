//! # nvdb-mapper Library
//!
//! Maps route references given on the carriageway-level road network ("fine"
//! link sequences) onto the trace-level network ("coarse" link sequences), and
//! collects thematic road data along the mapped route.
//!
//! ## Features
//!
//! - **Topology mapping**: carriageway intervals are translated through the
//!   super-references of their road links, with linear interpolation
//! - **Order preserving**: output intervals follow the route and keep its direction
//! - **Partial failures tolerated**: fetch and mapping problems become issues in
//!   the report instead of aborting the job
//! - **Chunked lookups**: thematic queries are batched and deduplicated
//! - **Progress tracking**: optional callback over thematic query chunks
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use nvdb_mapper::{Credentials, RouteRequest, Stop};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::load("credentials.json", "ruteplan")?;
//!     let request = RouteRequest::new(vec![
//!         Stop::new(269756.0, 7038421.0),
//!         Stop::new(270728.0, 7041733.0),
//!     ])?;
//!
//!     let report = nvdb_mapper::run(&request, credentials).await?;
//!     println!("{} speed limit record(s)", report.records.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Mapping Without I/O
//!
//! ```rust
//! use nvdb_mapper::{CoarseLinkIndex, LinearInterval, Segment, TopologyMapper};
//!
//! let index = CoarseLinkIndex::from_segments(vec![
//!     Segment::mapped(1878200, 0.0, 0.5, 1878165, 0.0, 3.2),
//!     Segment::mapped(1878200, 0.5, 1.0, 1878201, 0.0, 2.8),
//! ]);
//! let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1878200, 0.0, 1.0)]);
//!
//! let coarse = report.coarse_intervals();
//! assert_eq!(coarse[0], LinearInterval::new(1878165, 0.0, 3.2));
//! assert_eq!(coarse[1], LinearInterval::new(1878201, 0.0, 2.8));
//! ```

use std::sync::Arc;

pub use crate::core::client::{build_http_client, NvdbClient, RouteClient};
pub use crate::core::config::{Credentials, ServiceConfig};
pub use crate::core::error::{Error, Issue, Result, Severity};
pub use crate::core::fetch::{RouteFetcher, SegmentFetcher, ThematicFetcher};
pub use crate::core::index::{CoarseLinkIndex, IndexBuild};
pub use crate::core::job::{map_route, AlternativeReport, JobReport, MappingJob};
pub use crate::core::mapper::{MappedInterval, MappingKind, MappingReport, TopologyMapper};
pub use crate::core::options::{FetchPolicy, MappingOptions, ProgressCallback, RetryPolicy};
pub use crate::core::position::{LinearInterval, LinearPosition, LinkSequenceId, Topology};
pub use crate::core::query::{chunk_filters, dedup_records, query_key, query_keys};
pub use crate::core::route::{RouteAlternative, RoutePlan, RouteRequest, Stop};
pub use crate::core::segment::{Direction, RawLinkSequence, Segment, SuperReference};
pub use crate::core::thematic::ThematicRecord;

pub mod core;

/// Map a route and collect its thematic records using the public services
///
/// # Arguments
/// * `request` - Stops of the route
/// * `credentials` - Routing service endpoint and optional login
///
/// # Examples
/// ```rust,no_run
/// # use nvdb_mapper::{Credentials, RouteRequest, Stop};
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = Credentials::load("credentials.json", "ruteplan")?;
/// let request = RouteRequest::new(vec![Stop::new(1.0, 2.0), Stop::new(3.0, 4.0)])?;
/// let report = nvdb_mapper::run(&request, credentials).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run(request: &RouteRequest, credentials: Credentials) -> Result<JobReport> {
    run_with_options(
        request,
        credentials,
        ServiceConfig::default(),
        MappingOptions::default(),
    )
    .await
}

/// Like [`run`], reporting `(completed, total)` thematic query chunks
pub async fn run_with_progress<F>(
    request: &RouteRequest,
    credentials: Credentials,
    progress: F,
) -> Result<JobReport>
where
    F: Fn(u64, u64) + Send + Sync + 'static,
{
    let options = MappingOptions {
        progress: Some(Arc::new(progress)),
        ..Default::default()
    };
    run_with_options(request, credentials, ServiceConfig::default(), options).await
}

/// Run a mapping job against explicit endpoints and options
pub async fn run_with_options(
    request: &RouteRequest,
    credentials: Credentials,
    config: ServiceConfig,
    options: MappingOptions,
) -> Result<JobReport> {
    let http = build_http_client(options.fetch.timeout)?;
    let route = RouteClient::new(http.clone(), credentials);
    let nvdb = NvdbClient::new(http, config);

    let job = MappingJob::new(route, nvdb.clone(), nvdb, options);
    job.run(request).await
}
