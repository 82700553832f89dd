//! Topology mapper
//!
//! Translates carriageway-level intervals into trace-level intervals using the
//! super-references held by a [`CoarseLinkIndex`].
//!
//! A carriageway sequence may reference more than one trace sequence. Its
//! segments are split into contiguous groups sharing a trace id, and each group
//! overlapping the requested range yields one output interval. Each end of the
//! requested range is resolved against a group by, in order:
//!
//! 1. an exact match on a segment boundary (the near side of the range first),
//! 2. clamping when the value lies outside the group's fine range,
//! 3. linear interpolation inside the single segment containing the value,
//!    rounded to 8 decimals.

use serde::Serialize;

use crate::core::error::{Error, Issue, Result};
use crate::core::index::CoarseLinkIndex;
use crate::core::position::{round_offset, LinearInterval, LinkSequenceId};
use crate::core::segment::{Direction, Segment, SuperReference};

/// How an output interval was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingKind {
    /// Input already at trace level, emitted unchanged
    PassThrough,
    /// Resolved from carriageway level through super-references
    Mapped,
}

/// One trace-level interval together with the route reference it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedInterval {
    /// Trace-level interval; `(min, max)` ordered when mapped
    pub interval: LinearInterval,
    /// The carriageway-level input interval
    pub source: LinearInterval,
    pub kind: MappingKind,
    /// Direction of the carriageway relative to the trace sequence
    pub direction: Direction,
}

impl MappedInterval {
    /// The interval in the travel direction of its source, flipped when the
    /// carriageway runs against its trace sequence
    pub fn directed(&self) -> LinearInterval {
        match self.kind {
            MappingKind::PassThrough => self.interval,
            MappingKind::Mapped => {
                let against = self.direction == Direction::Against;
                self.interval.with_direction(self.source.is_reversed() != against)
            }
        }
    }
}

/// Mapped intervals of a batch plus the problems met on the way
#[derive(Debug, Clone, Default, Serialize)]
pub struct MappingReport {
    pub intervals: Vec<MappedInterval>,
    pub issues: Vec<Issue>,
}

impl MappingReport {
    pub fn coarse_intervals(&self) -> Vec<LinearInterval> {
        self.intervals.iter().map(|m| m.interval).collect()
    }

    pub fn extend(&mut self, other: MappingReport) {
        self.intervals.extend(other.intervals);
        self.issues.extend(other.issues);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Start,
    End,
}

/// Contiguous run of segments sharing one trace-level sequence
#[derive(Debug)]
struct Group<'a> {
    coarse_id: LinkSequenceId,
    segments: Vec<(&'a Segment, &'a SuperReference)>,
}

impl Group<'_> {
    fn fine_min(&self) -> f64 {
        self.segments
            .iter()
            .map(|(s, _)| s.fine_start)
            .fold(f64::INFINITY, f64::min)
    }

    fn fine_max(&self) -> f64 {
        self.segments
            .iter()
            .map(|(s, _)| s.fine_end)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Direction of the first segment; groups are not expected to mix directions
    fn direction(&self) -> Direction {
        self.segments
            .first()
            .map(|(_, r)| r.direction)
            .unwrap_or(Direction::Unspecified)
    }

    fn coarse_min(&self) -> f64 {
        self.segments
            .iter()
            .map(|(_, r)| r.start)
            .fold(f64::INFINITY, f64::min)
    }

    fn coarse_max(&self) -> f64 {
        self.segments
            .iter()
            .map(|(_, r)| r.end)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// True if `[lo, hi]` shares more than a touching boundary with the group
    fn overlaps(&self, lo: f64, hi: f64) -> bool {
        let (min, max) = (self.fine_min(), self.fine_max());
        if lo == hi {
            return min <= lo && lo <= max;
        }
        lo < max && hi > min
    }
}

/// Split the mapped segments of one sequence into contiguous groups by trace id
fn groups(segments: &[Segment]) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for segment in segments {
        let Some(super_ref) = segment.super_ref.as_ref() else {
            continue;
        };
        match groups.last_mut() {
            Some(group) if group.coarse_id == super_ref.sequence_id => {
                group.segments.push((segment, super_ref));
            }
            _ => groups.push(Group {
                coarse_id: super_ref.sequence_id,
                segments: vec![(segment, super_ref)],
            }),
        }
    }
    groups
}

pub struct TopologyMapper<'a> {
    index: &'a CoarseLinkIndex,
    strict: bool,
}

impl<'a> TopologyMapper<'a> {
    pub fn new(index: &'a CoarseLinkIndex) -> Self {
        Self {
            index,
            strict: false,
        }
    }

    /// In strict mode an ambiguous boundary fails the whole input interval
    /// instead of falling back to the first match.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Map a batch of route references, in order
    pub fn map(&self, intervals: &[LinearInterval]) -> MappingReport {
        let mut report = MappingReport::default();
        for iv in intervals {
            self.map_into(iv, &mut report);
        }
        report
    }

    /// Map one route reference into zero or more trace-level intervals
    pub fn map_interval(&self, iv: &LinearInterval) -> MappingReport {
        let mut report = MappingReport::default();
        self.map_into(iv, &mut report);
        report
    }

    fn map_into(&self, iv: &LinearInterval, report: &mut MappingReport) {
        let id = iv.link_sequence_id;
        let subject = format!("link sequence {id} ({iv})");

        if !self.index.requires_mapping(id) {
            if !self.index.contains(id) {
                let err = Error::fetch(
                    format!("link sequence {id}"),
                    "no segment data available, reference passed through unchanged",
                );
                report.issues.push(Issue::warning(subject, &err));
            }
            report.intervals.push(MappedInterval {
                interval: *iv,
                source: *iv,
                kind: MappingKind::PassThrough,
                direction: Direction::With,
            });
            return;
        }

        let (lo, hi) = (iv.min(), iv.max());
        let segments = self.index.segments_for(id);
        let mut mapped = Vec::new();
        let mut warnings = Vec::new();
        let mut overlapping = 0;

        for segment in segments.iter().filter(|s| s.super_ref.is_none()) {
            if segment.fine_start < hi && segment.fine_end > lo {
                warnings.push(Error::ValidationError(format!(
                    "range {}-{} has no super-reference and is left out",
                    segment.fine_start.max(lo),
                    segment.fine_end.min(hi)
                )));
            }
        }

        for group in groups(segments) {
            if !group.overlaps(lo, hi) {
                continue;
            }
            overlapping += 1;
            let resolved = self
                .resolve(id, &group, lo, Bound::Lower, &mut warnings)
                .and_then(|from| {
                    let to = self.resolve(id, &group, hi, Bound::Upper, &mut warnings)?;
                    Ok((from, to))
                });

            match resolved {
                Ok((from, to)) => {
                    let interval = LinearInterval::new(group.coarse_id, from, to).normalized();
                    log::debug!("Mapped {iv} => {interval}");
                    mapped.push(MappedInterval {
                        interval,
                        source: *iv,
                        kind: MappingKind::Mapped,
                        direction: group.direction(),
                    });
                }
                Err(e) if self.strict => {
                    report.issues.push(Issue::error(subject, &e));
                    return;
                }
                Err(e) => {
                    report
                        .issues
                        .push(Issue::error(format!("{subject} -> {}", group.coarse_id), &e));
                }
            }
        }

        if overlapping == 0 {
            let err = Error::AmbiguousMapping {
                link_sequence_id: id,
                position: lo,
                matches: 0,
            };
            report.issues.push(Issue::error(subject.clone(), &err));
        }

        for warning in &warnings {
            report.issues.push(Issue::warning(subject.clone(), warning));
        }
        report.intervals.extend(mapped);
    }

    /// Resolve one end of the requested range against a group
    fn resolve(
        &self,
        id: LinkSequenceId,
        group: &Group<'_>,
        value: f64,
        bound: Bound,
        warnings: &mut Vec<Error>,
    ) -> Result<f64> {
        let on_start: Vec<_> = group
            .segments
            .iter()
            .filter(|(s, _)| s.fine_start == value)
            .collect();
        let on_end: Vec<_> = group
            .segments
            .iter()
            .filter(|(s, _)| s.fine_end == value)
            .collect();

        let sides = match bound {
            Bound::Lower => [(on_start, Side::Start), (on_end, Side::End)],
            Bound::Upper => [(on_end, Side::End), (on_start, Side::Start)],
        };
        for (matches, side) in sides {
            let Some((_, super_ref)) = matches.first() else {
                continue;
            };
            if matches.len() > 1 {
                self.ambiguous(id, value, matches.len(), warnings)?;
            }
            return Ok(match side {
                Side::Start => super_ref.start,
                Side::End => super_ref.end,
            });
        }

        if value < group.fine_min() {
            return Ok(group.coarse_min());
        }
        if value > group.fine_max() {
            return Ok(group.coarse_max());
        }

        let candidates: Vec<_> = group
            .segments
            .iter()
            .filter(|(s, _)| s.contains(value))
            .collect();
        let Some((segment, super_ref)) = candidates.first() else {
            return Err(Error::AmbiguousMapping {
                link_sequence_id: id,
                position: value,
                matches: 0,
            });
        };
        if candidates.len() > 1 {
            self.ambiguous(id, value, candidates.len(), warnings)?;
        }

        let coarse = interpolate(segment, super_ref, value);
        log::debug!("Interpolating position {value} @ {id} => {coarse} @ {}", super_ref.sequence_id);
        Ok(coarse)
    }

    fn ambiguous(
        &self,
        id: LinkSequenceId,
        value: f64,
        matches: usize,
        warnings: &mut Vec<Error>,
    ) -> Result<()> {
        let err = Error::AmbiguousMapping {
            link_sequence_id: id,
            position: value,
            matches,
        };
        if self.strict {
            return Err(err);
        }
        warnings.push(err);
        Ok(())
    }
}

fn interpolate(segment: &Segment, super_ref: &SuperReference, value: f64) -> f64 {
    let ratio = (value - segment.fine_start) / (segment.fine_end - segment.fine_start);
    round_offset(super_ref.start + ratio * (super_ref.end - super_ref.start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Severity;

    const FINE: LinkSequenceId = 1878200;

    fn two_group_index() -> CoarseLinkIndex {
        CoarseLinkIndex::from_segments(vec![
            Segment::mapped(FINE, 0.0, 0.5, 1878165, 0.0, 3.2),
            Segment::mapped(FINE, 0.5, 1.0, 1878201, 0.0, 2.8),
            Segment::trace(625517, 0.0, 1.0),
        ])
    }

    #[test]
    fn test_end_to_end_two_groups() {
        let index = two_group_index();
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(FINE, 0.0, 1.0)]);

        assert_eq!(
            report.coarse_intervals(),
            vec![
                LinearInterval::new(1878165, 0.0, 3.2),
                LinearInterval::new(1878201, 0.0, 2.8),
            ]
        );
        assert!(report.issues.is_empty());
        assert!(report.intervals.iter().all(|m| m.kind == MappingKind::Mapped));
    }

    #[test]
    fn test_pass_through_unchanged() {
        let index = two_group_index();
        let iv = LinearInterval::new(625517, 0.7, 0.2);
        let report = TopologyMapper::new(&index).map(&[iv]);

        assert_eq!(report.coarse_intervals(), vec![iv]);
        assert_eq!(report.intervals[0].kind, MappingKind::PassThrough);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_unknown_sequence_passes_through_with_warning() {
        let index = two_group_index();
        let iv = LinearInterval::new(42, 0.0, 1.0);
        let report = TopologyMapper::new(&index).map(&[iv]);

        assert_eq!(report.coarse_intervals(), vec![iv]);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_exact_boundary_no_rounding() {
        let index = CoarseLinkIndex::from_segments(vec![
            Segment::mapped(1, 0.0, 0.123456789123, 2, 0.1, 0.111111111111),
            Segment::mapped(1, 0.123456789123, 1.0, 2, 0.111111111111, 0.9),
        ]);
        let report =
            TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.123456789123, 1.0)]);

        assert_eq!(
            report.coarse_intervals(),
            vec![LinearInterval::new(2, 0.111111111111, 0.9)]
        );
    }

    #[test]
    fn test_interpolation_midpoint() {
        let index =
            CoarseLinkIndex::from_segments(vec![Segment::mapped(1, 0.2, 0.6, 2, 10.0, 14.0)]);
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.4, 0.6)]);

        assert_eq!(report.coarse_intervals(), vec![LinearInterval::new(2, 12.0, 14.0)]);
    }

    #[test]
    fn test_interpolation_is_rounded_to_8_decimals() {
        let index =
            CoarseLinkIndex::from_segments(vec![Segment::mapped(1, 0.0, 0.3, 2, 0.0, 0.1)]);
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.0, 0.1)]);

        assert_eq!(
            report.coarse_intervals(),
            vec![LinearInterval::new(2, 0.0, 0.03333333)]
        );
    }

    #[test]
    fn test_clamping_below_and_above() {
        let index = CoarseLinkIndex::from_segments(vec![
            Segment::mapped(1, 0.2, 0.5, 2, 0.3, 0.6),
            Segment::mapped(1, 0.5, 0.8, 2, 0.6, 0.75),
        ]);
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.1, 0.9)]);

        assert_eq!(report.coarse_intervals(), vec![LinearInterval::new(2, 0.3, 0.75)]);
    }

    #[test]
    fn test_clamped_bounds_keep_stored_coarse_values() {
        let index = CoarseLinkIndex::from_segments(vec![
            Segment::mapped(1, 0.2, 0.5, 2, 0.123456789123, 0.4),
            Segment::mapped(1, 0.5, 0.8, 2, 0.4, 0.987654321987),
        ]);
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.1, 0.9)]);

        assert_eq!(
            report.coarse_intervals(),
            vec![LinearInterval::new(2, 0.123456789123, 0.987654321987)]
        );
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_range_outside_every_group_is_reported() {
        let index =
            CoarseLinkIndex::from_segments(vec![Segment::mapped(1, 0.0, 0.5, 2, 0.0, 0.5)]);
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.6, 0.9)]);

        assert!(report.intervals.is_empty());
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, Severity::Error);
        assert_eq!(report.issues[0].kind, "ambiguous-mapping");
    }

    #[test]
    fn test_range_without_super_reference_is_reported() {
        let index = CoarseLinkIndex::from_segments(vec![
            Segment::mapped(1, 0.0, 0.5, 2, 0.0, 0.5),
            Segment::trace(1, 0.5, 1.0),
        ]);
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.25, 0.75)]);

        assert_eq!(report.coarse_intervals(), vec![LinearInterval::new(2, 0.25, 0.5)]);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, Severity::Warning);
        assert!(report.issues[0].message.contains("0.5-0.75"));
    }

    #[test]
    fn test_against_direction_flips_travel_direction() {
        let mut segment = Segment::mapped(1, 0.0, 1.0, 2, 0.0, 4.0);
        if let Some(super_ref) = segment.super_ref.as_mut() {
            super_ref.direction = Direction::Against;
        }
        let index = CoarseLinkIndex::from_segments(vec![segment]);

        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.25, 0.5)]);
        let mapped = &report.intervals[0];
        assert_eq!(mapped.direction, Direction::Against);
        assert_eq!(mapped.interval, LinearInterval::new(2, 1.0, 2.0));
        assert_eq!(mapped.directed(), LinearInterval::new(2, 2.0, 1.0));

        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.5, 0.25)]);
        assert_eq!(report.intervals[0].directed(), LinearInterval::new(2, 1.0, 2.0));
    }

    #[test]
    fn test_reversed_input_is_normalized_and_keeps_direction() {
        let index = two_group_index();
        let iv = LinearInterval::new(FINE, 0.25, 0.0);
        let report = TopologyMapper::new(&index).map(&[iv]);

        assert_eq!(report.intervals.len(), 1);
        let mapped = &report.intervals[0];
        assert_eq!(mapped.interval, LinearInterval::new(1878165, 0.0, 1.6));
        assert_eq!(mapped.directed(), LinearInterval::new(1878165, 1.6, 0.0));
        assert_eq!(mapped.source, iv);
    }

    #[test]
    fn test_partial_overlap_only_touches_one_group() {
        let index = two_group_index();
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(FINE, 0.6, 1.0)]);

        assert_eq!(report.coarse_intervals(), vec![LinearInterval::new(1878201, 0.56, 2.8)]);
        assert!(report.issues.is_empty());

        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(FINE, 0.0, 0.5)]);
        assert_eq!(report.coarse_intervals(), vec![LinearInterval::new(1878165, 0.0, 3.2)]);
    }

    #[test]
    fn test_multiplicity_spanning_both_groups() {
        let index = two_group_index();
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(FINE, 0.75, 0.25)]);

        assert_eq!(
            report.coarse_intervals(),
            vec![
                LinearInterval::new(1878165, 1.6, 3.2),
                LinearInterval::new(1878201, 0.0, 1.4),
            ]
        );
    }

    fn overlapping_index() -> CoarseLinkIndex {
        CoarseLinkIndex::from_segments(vec![
            Segment::mapped(1, 0.0, 0.6, 2, 0.0, 0.6),
            Segment::mapped(1, 0.4, 1.0, 2, 0.4, 1.0),
        ])
    }

    #[test]
    fn test_ambiguous_interior_warns_and_uses_first() {
        let index = overlapping_index();
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.5, 1.0)]);

        assert_eq!(report.coarse_intervals(), vec![LinearInterval::new(2, 0.5, 1.0)]);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, "ambiguous-mapping");
        assert_eq!(report.issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_strict_mode_fails_only_the_offending_interval() {
        let index = overlapping_index();
        let ok = LinearInterval::new(1, 0.0, 1.0);
        let report = TopologyMapper::new(&index)
            .strict(true)
            .map(&[LinearInterval::new(1, 0.5, 1.0), ok]);

        assert_eq!(report.coarse_intervals(), vec![LinearInterval::new(2, 0.0, 1.0)]);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_duplicate_exact_match_is_ambiguous() {
        let index = CoarseLinkIndex::from_segments(vec![
            Segment::mapped(1, 0.0, 0.5, 2, 0.0, 0.5),
            Segment::mapped(1, 0.0, 0.5, 2, 0.1, 0.5),
        ]);
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.0, 0.5)]);
        assert_eq!(report.coarse_intervals(), vec![LinearInterval::new(2, 0.0, 0.5)]);
        assert_eq!(report.issues.len(), 2);

        let strict = TopologyMapper::new(&index)
            .strict(true)
            .map(&[LinearInterval::new(1, 0.0, 0.5)]);
        assert!(strict.intervals.is_empty());
    }

    #[test]
    fn test_gap_in_segments_fails_group() {
        let index = CoarseLinkIndex::from_segments(vec![
            Segment::mapped(1, 0.0, 0.3, 2, 0.0, 0.3),
            Segment::mapped(1, 0.6, 1.0, 2, 0.6, 1.0),
        ]);
        let report = TopologyMapper::new(&index).map(&[LinearInterval::new(1, 0.4, 1.0)]);

        assert!(report.intervals.is_empty());
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].message.contains("found 0"));
    }
}
