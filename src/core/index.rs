//! Coarse link index
//!
//! For every carriageway link sequence referenced by a route, the index holds the
//! ordered segments describing how its offset range decomposes into trace-level
//! offset ranges. It is built once per job and read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};

use futures::StreamExt;

use crate::core::error::{Error, Issue};
use crate::core::fetch::{with_retry, SegmentFetcher};
use crate::core::options::FetchPolicy;
use crate::core::position::LinkSequenceId;
use crate::core::segment::{flatten, Segment};

#[derive(Debug, Clone, Default)]
pub struct CoarseLinkIndex {
    sequences: BTreeMap<LinkSequenceId, Vec<Segment>>,
}

/// Result of building an index: the index plus what could not be loaded
#[derive(Debug, Default)]
pub struct IndexBuild {
    pub index: CoarseLinkIndex,
    /// Ids that could not be fetched, with the reason
    pub failures: Vec<(LinkSequenceId, Error)>,
    /// Per-record problems (invalid records) and fetch failures, for reporting
    pub issues: Vec<Issue>,
    /// Number of distinct ids requested
    pub requested: usize,
}

impl IndexBuild {
    /// True if ids were requested and none of them could be fetched
    pub fn all_failed(&self) -> bool {
        self.requested > 0 && self.failures.len() == self.requested
    }
}

impl CoarseLinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index directly from segments, grouped by their link sequence
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        let mut grouped: BTreeMap<LinkSequenceId, Vec<Segment>> = BTreeMap::new();
        for segment in segments {
            grouped.entry(segment.link_sequence_id).or_default().push(segment);
        }
        let mut index = Self::new();
        for (id, segments) in grouped {
            for err in index.insert(id, segments) {
                log::warn!("{err}");
            }
        }
        index
    }

    /// Fetch and flatten every id in `ids`.
    ///
    /// Fetches run concurrently (bounded by `policy.max_concurrent`); results are
    /// keyed by id so completion order does not matter. Ids that fail are recorded
    /// in [`IndexBuild::failures`] and left out of the index.
    pub async fn build<F>(
        fetcher: &F,
        ids: impl IntoIterator<Item = LinkSequenceId>,
        policy: &FetchPolicy,
    ) -> IndexBuild
    where
        F: SegmentFetcher,
    {
        let ids: BTreeSet<LinkSequenceId> = ids.into_iter().collect();
        let mut build = IndexBuild {
            requested: ids.len(),
            ..Default::default()
        };

        let results: Vec<_> = futures::stream::iter(ids)
            .map(move |id| async move {
                let target = format!("link sequence {id}");
                let result =
                    with_retry(&target, policy, || fetcher.fetch_link_sequence(id)).await;
                (id, result)
            })
            .buffer_unordered(policy.max_concurrent.max(1))
            .collect()
            .await;

        for (id, result) in results {
            match result {
                Ok(raw) => {
                    let flat = flatten(id, raw);
                    if flat.historical > 0 {
                        log::debug!(
                            "Ignoring {} historical road link(s) @ link sequence {id}",
                            flat.historical
                        );
                    }
                    for err in &flat.invalid {
                        build
                            .issues
                            .push(Issue::warning(format!("link sequence {id}"), err));
                    }
                    for err in build.index.insert(id, flat.segments) {
                        build
                            .issues
                            .push(Issue::warning(format!("link sequence {id}"), &err));
                    }
                }
                Err(e) => {
                    build.issues.push(Issue::error(format!("link sequence {id}"), &e));
                    build.failures.push((id, e));
                }
            }
        }

        build.failures.sort_by_key(|(id, _)| *id);
        log::info!(
            "Indexed {} of {} link sequence(s), {} require mapping",
            build.index.len(),
            build.requested,
            build.index.mapped_ids().count()
        );
        build
    }

    /// Add the segments of one link sequence. Existing entries are never replaced.
    ///
    /// Segments without a positive fine range are left out and returned as errors.
    pub fn insert(&mut self, id: LinkSequenceId, segments: Vec<Segment>) -> Vec<Error> {
        let (mut valid, invalid): (Vec<_>, Vec<_>) = segments
            .into_iter()
            .partition(|s| s.fine_start < s.fine_end);
        let rejected = invalid
            .iter()
            .map(|s| {
                Error::ValidationError(format!(
                    "segment @ link sequence {id} has empty range {}-{}",
                    s.fine_start, s.fine_end
                ))
            })
            .collect();

        valid.sort_by(|a, b| a.fine_start.total_cmp(&b.fine_start));
        self.sequences.entry(id).or_insert(valid);
        rejected
    }

    /// Ordered segments of `id`; empty if the id is not indexed
    pub fn segments_for(&self, id: LinkSequenceId) -> &[Segment] {
        self.sequences.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if `id` was fetched into the index
    pub fn contains(&self, id: LinkSequenceId) -> bool {
        self.sequences.contains_key(&id)
    }

    /// True if at least one segment of `id` carries a super-reference
    pub fn requires_mapping(&self, id: LinkSequenceId) -> bool {
        self.segments_for(id).iter().any(|s| s.super_ref.is_some())
    }

    /// Ids of the carriageway-level sequences in the index
    pub fn mapped_ids(&self) -> impl Iterator<Item = LinkSequenceId> + '_ {
        self.sequences
            .iter()
            .filter(|(_, segments)| segments.iter().any(|s| s.super_ref.is_some()))
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}
