//! Redundant entries within a single playlist.

use rustc_hash::FxHashMap;

use crate::models::PlaylistEntry;

/// Entry ids to remove so each track is referenced once.
///
/// An entry is redundant when another entry of the same playlist points at
/// the same track with a smaller (earlier inserted) entry id. Position in the
/// playlist does not matter. Ids are returned in entry order.
pub fn find_redundant_entries(entries: &[PlaylistEntry]) -> Vec<i64> {
    let mut lowest: FxHashMap<&str, i64> = FxHashMap::default();
    for entry in entries {
        lowest
            .entry(entry.track_id.as_str())
            .and_modify(|id| *id = (*id).min(entry.id))
            .or_insert(entry.id);
    }

    entries
        .iter()
        .filter(|e| lowest.get(e.track_id.as_str()).is_some_and(|&min| e.id > min))
        .map(|e| e.id)
        .collect()
}
