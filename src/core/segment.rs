//! Link-sequence segments and flattening of raw link-sequence records
//!
//! A fetched link sequence is a list of road links, each covering an offset range
//! of the sequence. Links at carriageway level carry a super-reference pointing at
//! the trace-level sequence they belong to.

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::position::LinkSequenceId;

/// Direction of a fine segment relative to its coarse link sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    With,
    Against,
    Unspecified,
}

impl Direction {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("MED") || v.eq_ignore_ascii_case("WITH") => {
                Direction::With
            }
            Some(v) if v.eq_ignore_ascii_case("MOT") || v.eq_ignore_ascii_case("AGAINST") => {
                Direction::Against
            }
            _ => Direction::Unspecified,
        }
    }
}

/// Link from a fine segment to the coarse link sequence it is part of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperReference {
    pub sequence_id: LinkSequenceId,
    pub start: f64,
    pub end: f64,
    pub direction: Direction,
    pub lanes: Vec<String>,
}

/// One active road link of a fine link sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub link_sequence_id: LinkSequenceId,
    pub link_number: Option<u32>,
    pub fine_start: f64,
    pub fine_end: f64,
    pub super_ref: Option<SuperReference>,
}

impl Segment {
    /// Segment already at trace level
    pub fn trace(link_sequence_id: LinkSequenceId, fine_start: f64, fine_end: f64) -> Self {
        Self {
            link_sequence_id,
            link_number: None,
            fine_start,
            fine_end,
            super_ref: None,
        }
    }

    /// Carriageway segment mapped onto `coarse_id` over `[coarse_start, coarse_end]`
    pub fn mapped(
        link_sequence_id: LinkSequenceId,
        fine_start: f64,
        fine_end: f64,
        coarse_id: LinkSequenceId,
        coarse_start: f64,
        coarse_end: f64,
    ) -> Self {
        Self {
            link_sequence_id,
            link_number: None,
            fine_start,
            fine_end,
            super_ref: Some(SuperReference {
                sequence_id: coarse_id,
                start: coarse_start,
                end: coarse_end,
                direction: Direction::With,
                lanes: Vec::new(),
            }),
        }
    }

    pub fn coarse_id(&self) -> Option<LinkSequenceId> {
        self.super_ref.as_ref().map(|s| s.sequence_id)
    }

    /// True if `value` lies within `[fine_start, fine_end]`
    pub fn contains(&self, value: f64) -> bool {
        self.fine_start <= value && value <= self.fine_end
    }
}

/// Raw link sequence as returned by the road network API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLinkSequence {
    #[serde(rename = "veglenkesekvensid")]
    pub id: Option<LinkSequenceId>,
    #[serde(rename = "veglenker", default)]
    pub links: Vec<RawLink>,
}

/// Raw road link record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLink {
    #[serde(rename = "veglenkenummer")]
    pub link_number: Option<u32>,
    #[serde(rename = "startposisjon")]
    pub start: Option<f64>,
    #[serde(rename = "sluttposisjon")]
    pub end: Option<f64>,
    #[serde(rename = "sluttdato")]
    pub end_date: Option<String>,
    #[serde(rename = "superstedfesting")]
    pub super_ref: Option<RawSuperReference>,
}

/// Raw super-reference block of a road link
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSuperReference {
    #[serde(rename = "veglenkesekvensid")]
    pub sequence_id: Option<LinkSequenceId>,
    #[serde(rename = "startposisjon")]
    pub start: Option<f64>,
    #[serde(rename = "sluttposisjon")]
    pub end: Option<f64>,
    #[serde(rename = "retning")]
    pub direction: Option<String>,
    #[serde(rename = "kjørefelt", default)]
    pub lanes: Vec<String>,
}

/// Result of flattening one raw link sequence
#[derive(Debug, Default)]
pub struct Flattened {
    pub segments: Vec<Segment>,
    /// Number of historical links dropped because their end date is set
    pub historical: usize,
    /// Links dropped because of missing or inconsistent fields
    pub invalid: Vec<Error>,
}

/// Flatten a raw link sequence into active segments ordered by `fine_start`.
///
/// `id` is the sequence id that was requested; it is used when the record
/// does not repeat it.
pub fn flatten(id: LinkSequenceId, raw: RawLinkSequence) -> Flattened {
    let id = raw.id.unwrap_or(id);
    let mut out = Flattened::default();

    for link in raw.links {
        if link.end_date.is_some() {
            out.historical += 1;
            continue;
        }
        match flatten_link(id, link) {
            Ok(segment) => out.segments.push(segment),
            Err(e) => out.invalid.push(e),
        }
    }

    out.segments.sort_by(|a, b| a.fine_start.total_cmp(&b.fine_start));
    out
}

fn flatten_link(id: LinkSequenceId, link: RawLink) -> Result<Segment, Error> {
    let missing = |field: &str| {
        Error::ValidationError(format!(
            "road link {} @ link sequence {id} is missing '{field}'",
            link.link_number.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string())
        ))
    };

    let fine_start = link.start.ok_or_else(|| missing("startposisjon"))?;
    let fine_end = link.end.ok_or_else(|| missing("sluttposisjon"))?;
    if fine_start >= fine_end {
        return Err(Error::ValidationError(format!(
            "road link @ link sequence {id} has empty range {fine_start}-{fine_end}"
        )));
    }

    let super_ref = match &link.super_ref {
        None => None,
        Some(raw) => Some(SuperReference {
            sequence_id: raw
                .sequence_id
                .ok_or_else(|| missing("superstedfesting.veglenkesekvensid"))?,
            start: raw.start.ok_or_else(|| missing("superstedfesting.startposisjon"))?,
            end: raw.end.ok_or_else(|| missing("superstedfesting.sluttposisjon"))?,
            direction: Direction::parse(raw.direction.as_deref()),
            lanes: raw.lanes.clone(),
        }),
    };

    Ok(Segment {
        link_sequence_id: id,
        link_number: link.link_number,
        fine_start,
        fine_end,
        super_ref,
    })
}
