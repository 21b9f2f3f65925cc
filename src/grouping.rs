//! Partition a track snapshot into duplicate groups by identity key.

use rustc_hash::FxHashMap;

use crate::models::{DuplicateGroup, TrackRecord};

/// Group tracks sharing an identical identity key.
///
/// Members keep ascending snapshot order, groups are ordered by their first
/// member, and singleton groups are dropped.
pub fn group_duplicates(tracks: &[TrackRecord]) -> Vec<DuplicateGroup> {
    // key -> position in `groups`
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();

    for track in tracks {
        match index.get(track.identity_key.as_str()) {
            Some(&pos) => groups[pos].1.push(track.index),
            None => {
                index.insert(track.identity_key.as_str(), groups.len());
                groups.push((track.identity_key.as_str(), vec![track.index]));
            }
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(key, indices)| DuplicateGroup {
            key: key.to_string(),
            indices,
        })
        .collect()
}
