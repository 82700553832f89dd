//! The mapping job: route → coarse link index → topology mapper → thematic records

use std::collections::HashSet;

use serde::Serialize;

use crate::core::error::{Error, Issue, Result};
use crate::core::fetch::{with_retry, RouteFetcher, SegmentFetcher, ThematicFetcher};
use crate::core::index::CoarseLinkIndex;
use crate::core::mapper::{MappedInterval, TopologyMapper};
use crate::core::options::MappingOptions;
use crate::core::position::LinearInterval;
use crate::core::query::{chunk_filters, dedup_records, query_keys};
use crate::core::route::{RoutePlan, RouteRequest};
use crate::core::thematic::ThematicRecord;

/// Mapping result of one route alternative
#[derive(Debug, Clone, Serialize)]
pub struct AlternativeReport {
    pub index: usize,
    /// Carriageway-level references as returned by the routing service
    pub references: Vec<LinearInterval>,
    /// Trace-level intervals
    pub mapped: Vec<MappedInterval>,
}

/// Everything a job produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobReport {
    pub alternatives: Vec<AlternativeReport>,
    /// Distinct query keys sent to the thematic service
    pub query_keys: Vec<String>,
    /// Deduplicated thematic records along the route
    pub records: Vec<ThematicRecord>,
    pub issues: Vec<Issue>,
}

/// Map every alternative of `plan` through `index`, without any I/O
pub fn map_route(
    plan: &RoutePlan,
    index: &CoarseLinkIndex,
    strict: bool,
) -> (Vec<AlternativeReport>, Vec<Issue>) {
    let mapper = TopologyMapper::new(index).strict(strict);
    let mut issues = Vec::new();

    let alternatives = plan
        .alternatives
        .iter()
        .map(|alternative| {
            let report = mapper.map(&alternative.references);
            issues.extend(report.issues);
            AlternativeReport {
                index: alternative.index,
                references: alternative.references.clone(),
                mapped: report.intervals,
            }
        })
        .collect();

    (alternatives, issues)
}

/// A job wired to its three external collaborators
pub struct MappingJob<R, S, T> {
    route: R,
    segments: S,
    thematic: T,
    options: MappingOptions,
}

impl<R, S, T> MappingJob<R, S, T>
where
    R: RouteFetcher,
    S: SegmentFetcher,
    T: ThematicFetcher,
{
    pub fn new(route: R, segments: S, thematic: T, options: MappingOptions) -> Self {
        Self {
            route,
            segments,
            thematic,
            options,
        }
    }

    pub fn options(&self) -> &MappingOptions {
        &self.options
    }

    /// Run the whole pipeline for one route request.
    ///
    /// Fails only when the route itself can't be fetched or when none of the
    /// referenced link sequences could be loaded. Everything else is recorded
    /// as an issue in the report.
    pub async fn run(&self, request: &RouteRequest) -> Result<JobReport> {
        let policy = &self.options.fetch;

        let plan = with_retry("route", policy, || self.route.fetch_route(request)).await?;
        log::info!("Routing service returned {} alternative(s)", plan.alternatives.len());

        let build =
            CoarseLinkIndex::build(&self.segments, plan.distinct_sequence_ids(), policy).await;
        if build.all_failed() {
            return Err(Error::fetch(
                format!("all {} link sequence(s) of the route", build.requested),
                build
                    .failures
                    .first()
                    .map(|(_, e)| e.to_string())
                    .unwrap_or_default(),
            ));
        }

        let mut report = JobReport {
            issues: plan.issues.clone(),
            ..Default::default()
        };
        report.issues.extend(build.issues);

        let (alternatives, issues) = map_route(&plan, &build.index, self.options.strict);
        report.issues.extend(issues);

        let mapped: Vec<MappedInterval> = alternatives
            .iter()
            .flat_map(|a| a.mapped.iter().cloned())
            .collect();
        let mut seen = HashSet::new();
        report.query_keys = query_keys(&mapped)
            .into_iter()
            .filter(|k| seen.insert(k.clone()))
            .collect();
        report.alternatives = alternatives;

        let (records, issues) = self.fetch_thematic(&report.query_keys).await?;
        report.records = records;
        report.issues.extend(issues);

        Ok(report)
    }

    /// Fetch thematic records for `keys` chunk by chunk, then deduplicate
    async fn fetch_thematic(&self, keys: &[String]) -> Result<(Vec<ThematicRecord>, Vec<Issue>)> {
        let filters = chunk_filters(keys, self.options.chunk_size)?;
        let total = filters.len() as u64;
        let object_type = self.options.object_type;

        let mut records = Vec::new();
        let mut issues = Vec::new();
        for (n, filter) in filters.iter().enumerate() {
            log::debug!(
                "Fetching object type {object_type} for query chunk {} of {total}",
                n + 1
            );
            let target = format!("query chunk {}", n + 1);
            match with_retry(&target, &self.options.fetch, || {
                self.thematic.fetch_records(object_type, filter)
            })
            .await
            {
                Ok(chunk) => records.extend(chunk),
                Err(e) => issues.push(Issue::error(target, &e)),
            }
            if let Some(ref progress) = self.options.progress {
                progress(n as u64 + 1, total);
            }
        }

        Ok((dedup_records(records), issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::{FetchPolicy, RetryPolicy};
    use crate::core::position::LinkSequenceId;
    use crate::core::route::{RouteAlternative, Stop};
    use crate::core::segment::{RawLinkSequence, Segment};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct FixedRoute(RoutePlan);

    impl RouteFetcher for FixedRoute {
        async fn fetch_route(&self, _request: &RouteRequest) -> Result<RoutePlan> {
            Ok(self.0.clone())
        }
    }

    struct Network;

    impl SegmentFetcher for Network {
        async fn fetch_link_sequence(&self, id: LinkSequenceId) -> Result<RawLinkSequence> {
            let json = match id {
                1878200 => serde_json::json!({ "veglenker": [
                    { "startposisjon": 0.0, "sluttposisjon": 0.5,
                      "superstedfesting": { "veglenkesekvensid": 1878165, "startposisjon": 0.0, "sluttposisjon": 3.2 } },
                    { "startposisjon": 0.5, "sluttposisjon": 1.0,
                      "superstedfesting": { "veglenkesekvensid": 1878201, "startposisjon": 0.0, "sluttposisjon": 2.8 } }
                ]}),
                625517 => serde_json::json!({ "veglenker": [ { "startposisjon": 0.0, "sluttposisjon": 1.0 } ] }),
                _ => return Err(Error::fetch(format!("link sequence {id}"), "HTTP status=404")),
            };
            Ok(serde_json::from_value(json)?)
        }
    }

    #[derive(Default)]
    struct Thematic {
        filters: Mutex<Vec<String>>,
    }

    impl ThematicFetcher for Thematic {
        async fn fetch_records(&self, object_type: u32, filter: &str) -> Result<Vec<ThematicRecord>> {
            self.filters.lock().unwrap().push(filter.to_string());
            Ok(filter
                .split(',')
                .map(|key| {
                    let seq: u64 = key.split('@').nth(1).unwrap().parse().unwrap();
                    ThematicRecord {
                        record_id: seq * 10,
                        version: 1,
                        object_type: Some(object_type),
                        link_sequence_id: seq,
                        start_offset: 0.0,
                        end_offset: 1.0,
                        properties: BTreeMap::new(),
                        geometry: None,
                    }
                })
                .collect())
        }
    }

    fn plan(alternatives: Vec<Vec<LinearInterval>>) -> RoutePlan {
        RoutePlan {
            alternatives: alternatives
                .into_iter()
                .enumerate()
                .map(|(index, references)| RouteAlternative { index, references })
                .collect(),
            ..Default::default()
        }
    }

    fn options() -> MappingOptions {
        MappingOptions {
            chunk_size: 2,
            fetch: FetchPolicy {
                timeout: Duration::from_secs(5),
                retry: RetryPolicy::none(),
                max_concurrent: 2,
            },
            ..Default::default()
        }
    }

    fn request() -> RouteRequest {
        RouteRequest::new(vec![Stop::new(0.0, 0.0), Stop::new(1.0, 1.0)]).unwrap()
    }

    #[test]
    fn test_map_route_per_alternative() {
        let index = CoarseLinkIndex::from_segments(vec![
            Segment::mapped(1878200, 0.0, 0.5, 1878165, 0.0, 3.2),
            Segment::mapped(1878200, 0.5, 1.0, 1878201, 0.0, 2.8),
        ]);
        let plan = plan(vec![
            vec![LinearInterval::new(1878200, 0.0, 1.0)],
            vec![LinearInterval::new(1878200, 0.0, 0.5)],
        ]);
        let (alternatives, issues) = map_route(&plan, &index, false);

        assert!(issues.is_empty());
        assert_eq!(alternatives[0].mapped.len(), 2);
        assert_eq!(alternatives[1].mapped.len(), 1);
        assert_eq!(alternatives[1].index, 1);
    }

    #[tokio::test]
    async fn test_run_full_pipeline() {
        let route = FixedRoute(plan(vec![
            vec![
                LinearInterval::new(1878200, 0.0, 1.0),
                LinearInterval::new(625517, 1.0, 0.4),
            ],
            vec![LinearInterval::new(625517, 0.4, 1.0)],
        ]));
        let thematic = Thematic::default();
        let progress_calls = Arc::new(AtomicU64::new(0));
        let calls = Arc::clone(&progress_calls);
        let mut opts = options();
        opts.progress = Some(Arc::new(move |_done, _total| {
            calls.fetch_add(1, Ordering::SeqCst);
        }));

        let job = MappingJob::new(route, Network, thematic, opts);
        let report = job.run(&request()).await.unwrap();

        assert_eq!(
            report.query_keys,
            vec!["0-3.2@1878165", "0-2.8@1878201", "0.4-1@625517"]
        );
        assert_eq!(report.records.len(), 3, "duplicates across alternatives removed");
        assert!(report.issues.is_empty());
        assert_eq!(progress_calls.load(Ordering::SeqCst), 2);
        assert_eq!(job.thematic.filters.lock().unwrap().len(), 2);
        assert_eq!(report.alternatives[0].mapped[2].directed().from, 1.0);
    }

    #[tokio::test]
    async fn test_run_skips_failed_sequences() {
        let route = FixedRoute(plan(vec![vec![
            LinearInterval::new(625517, 0.0, 1.0),
            LinearInterval::new(31337, 0.0, 1.0),
        ]]));
        let job = MappingJob::new(route, Network, Thematic::default(), options());
        let report = job.run(&request()).await.unwrap();

        // one fetch failure, one pass-through warning for the missing sequence
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.alternatives[0].mapped.len(), 2);
    }

    #[tokio::test]
    async fn test_run_fails_when_every_sequence_fails() {
        let route = FixedRoute(plan(vec![vec![LinearInterval::new(31337, 0.0, 1.0)]]));
        let job = MappingJob::new(route, Network, Thematic::default(), options());
        let err = job.run(&request()).await.unwrap_err();
        assert!(matches!(err, Error::FetchError { .. }));
    }
}
