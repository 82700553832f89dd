//! Batch query keys for thematic lookups
//!
//! Trace-level intervals are turned into `<min>-<max>@<id>` keys and split into
//! chunks, since the thematic API limits how long a query may be. Adjacent chunks
//! can return the same object, so chunked results must be deduplicated.

use std::collections::HashSet;

use crate::core::error::{Error, Result};
use crate::core::mapper::MappedInterval;
use crate::core::position::LinearInterval;
use crate::core::thematic::ThematicRecord;

/// Query key of an interval, always `(min, max)` ordered
pub fn query_key(interval: &LinearInterval) -> String {
    format!(
        "{}-{}@{}",
        interval.min(),
        interval.max(),
        interval.link_sequence_id
    )
}

/// Query keys for all mapped intervals, in order
pub fn query_keys(intervals: &[MappedInterval]) -> Vec<String> {
    intervals.iter().map(|m| query_key(&m.interval)).collect()
}

/// Join keys into comma-separated filters of at most `chunk_size` keys each
pub fn chunk_filters(keys: &[String], chunk_size: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(Error::ValidationError(
            "chunk size must be at least 1".to_string(),
        ));
    }
    Ok(keys.chunks(chunk_size).map(|chunk| chunk.join(",")).collect())
}

/// Drop repeated records, keeping the first occurrence of every
/// `(record_id, version, link_sequence_id, start_offset)`.
pub fn dedup_records(records: Vec<ThematicRecord>) -> Vec<ThematicRecord> {
    let mut seen = HashSet::new();
    let before = records.len();
    let unique: Vec<_> = records
        .into_iter()
        .filter(|r| {
            seen.insert((
                r.record_id,
                r.version,
                r.link_sequence_id,
                r.start_offset.to_bits(),
            ))
        })
        .collect();
    log::debug!(
        "Thematic records before duplicate removal: {before}, after: {}",
        unique.len()
    );
    unique
}
