//! Survivor selection for duplicate groups.
//!
//! Criteria are consulted in a fixed order and the first one that
//! discriminates between the group members decides:
//! - Highest bit rate
//! - Not imported from a device
//! - Oldest creation time
//! - Lowest snapshot index (fallback)

use crate::models::{Criterion, DedupStats, DuplicateGroup, Resolution, TrackRecord};
use crate::progress::{create_progress_bar, log_progress};

// ============================================================================
// Group Resolution
// ============================================================================

/// Pick the survivor of one duplicate group.
///
/// `tracks` is the full snapshot; group members are looked up by their
/// global index.
pub fn select_survivor(group: &DuplicateGroup, tracks: &[TrackRecord], marker: &str) -> Resolution {
    let members: Vec<&TrackRecord> = group.indices.iter().filter_map(|&i| tracks.get(i)).collect();

    let (survivor, criterion) = if let Some(best) = by_highest_bitrate(&members) {
        (best, Criterion::HighestBitrate)
    } else if let Some(best) = by_not_imported(&members, marker) {
        (best, Criterion::RemoveImported)
    } else if let Some(best) = by_oldest(&members) {
        (best, Criterion::CreatedAt)
    } else {
        (first_index(group), Criterion::FirstIndex)
    };

    Resolution {
        group: group.clone(),
        survivor,
        criterion,
    }
}

/// Resolve every group, tallying which criterion fired.
pub fn resolve_groups(
    groups: &[DuplicateGroup],
    tracks: &[TrackRecord],
    marker: &str,
) -> (Vec<Resolution>, DedupStats) {
    let pb = create_progress_bar(groups.len() as u64, "Resolving duplicate groups");
    let mut stats = DedupStats {
        total_tracks: tracks.len(),
        total_groups: groups.len(),
        ..DedupStats::default()
    };

    let mut resolutions = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let resolution = select_survivor(group, tracks, marker);
        stats.record(resolution.criterion);
        stats.total_duplicates += group.indices.len().saturating_sub(1);
        resolutions.push(resolution);
        pb.inc(1);
        log_progress("resolve", i as u64 + 1, groups.len() as u64, 1_000);
    }

    pb.finish_with_message(format!("Resolved {} duplicate groups", resolutions.len()));
    (resolutions, stats)
}

// ============================================================================
// Criteria
// ============================================================================

fn all_equal<T: PartialEq>(mut items: impl Iterator<Item = T>) -> bool {
    match items.next() {
        Some(first) => items.all(|item| item == first),
        None => true,
    }
}

/// Maximum bit rate, first occurrence wins among equal maxima.
fn by_highest_bitrate(members: &[&TrackRecord]) -> Option<usize> {
    if all_equal(members.iter().map(|t| t.bit_rate)) {
        return None;
    }
    let mut best = members[0];
    for &track in &members[1..] {
        if track.bit_rate > best.bit_rate {
            best = track;
        }
    }
    Some(best.index)
}

/// First member without the device-import marker, when the group is mixed.
fn by_not_imported(members: &[&TrackRecord], marker: &str) -> Option<usize> {
    let imported: Vec<bool> = members.iter().map(|t| t.is_device_import(marker)).collect();
    if !(imported.contains(&true) && imported.contains(&false)) {
        return None;
    }
    members
        .iter()
        .find(|t| !t.is_device_import(marker))
        .map(|t| t.index)
}

/// Earliest creation time. Unparseable timestamps sort after parsed ones.
fn by_oldest(members: &[&TrackRecord]) -> Option<usize> {
    if all_equal(members.iter().map(|t| t.created_at)) {
        return None;
    }
    // min_by_key keeps the first of equal minima
    members
        .iter()
        .min_by_key(|t| (t.created_at.is_none(), t.created_at))
        .map(|t| t.index)
}

/// Smallest global index across the whole snapshot.
fn first_index(group: &DuplicateGroup) -> usize {
    group.indices.iter().copied().min().unwrap_or_default()
}
