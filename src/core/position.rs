//! Linear positions and intervals on road-link sequences

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a road-link sequence at one topology level
pub type LinkSequenceId = u64;

/// Number of decimals kept for linear offsets
pub const OFFSET_DECIMALS: i32 = 8;

/// Topology level of a link sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Fine, direction-specific carriageway level
    Carriageway,
    /// Coarse road-trace level
    Trace,
}

/// A point on a link sequence, as an offset fraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearPosition {
    pub link_sequence_id: LinkSequenceId,
    pub offset: f64,
}

impl LinearPosition {
    pub fn new(link_sequence_id: LinkSequenceId, offset: f64) -> Self {
        Self {
            link_sequence_id,
            offset,
        }
    }
}

impl fmt::Display for LinearPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.offset, self.link_sequence_id)
    }
}

/// An interval on a link sequence. `from` and `to` are not necessarily ordered;
/// `from > to` means the interval runs against the sequence direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearInterval {
    pub link_sequence_id: LinkSequenceId,
    pub from: f64,
    pub to: f64,
}

impl LinearInterval {
    pub fn new(link_sequence_id: LinkSequenceId, from: f64, to: f64) -> Self {
        Self {
            link_sequence_id,
            from,
            to,
        }
    }

    /// Lower offset of the interval
    pub fn min(&self) -> f64 {
        self.from.min(self.to)
    }

    /// Upper offset of the interval
    pub fn max(&self) -> f64 {
        self.from.max(self.to)
    }

    /// True if the interval runs against the link sequence direction
    pub fn is_reversed(&self) -> bool {
        self.from > self.to
    }

    /// The same interval with `from <= to`
    pub fn normalized(&self) -> Self {
        Self::new(self.link_sequence_id, self.min(), self.max())
    }

    /// The interval with `reversed` direction applied to its normalized form
    pub fn with_direction(&self, reversed: bool) -> Self {
        if reversed {
            Self::new(self.link_sequence_id, self.max(), self.min())
        } else {
            self.normalized()
        }
    }

    pub fn start(&self) -> LinearPosition {
        LinearPosition::new(self.link_sequence_id, self.from)
    }

    pub fn end(&self) -> LinearPosition {
        LinearPosition::new(self.link_sequence_id, self.to)
    }
}

impl fmt::Display for LinearInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}@{}", self.from, self.to, self.link_sequence_id)
    }
}

/// Round an offset to [`OFFSET_DECIMALS`] decimals, half away from zero
pub fn round_offset(value: f64) -> f64 {
    let scale = 10f64.powi(OFFSET_DECIMALS);
    (value * scale).round() / scale
}
