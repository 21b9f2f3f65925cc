//! Build the survivor → duplicates removal map from group resolutions.

use log::warn;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Resolution, TrackId, TrackRecord};

/// Mapping from survivor id to the duplicate ids it replaces.
///
/// Survivor ids and duplicate ids are disjoint, and each duplicate id is
/// listed under exactly one survivor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RemovalMap {
    entries: BTreeMap<TrackId, Vec<TrackId>>,
}

impl RemovalMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, survivor: TrackId) -> Option<&[TrackId]> {
        self.entries.get(&survivor).map(Vec::as_slice)
    }

    /// Duplicates listed under the given survivors only.
    pub fn duplicates_of(&self, survivors: &[TrackId]) -> Vec<TrackId> {
        survivors
            .iter()
            .filter_map(|s| self.entries.get(s))
            .flatten()
            .copied()
            .collect()
    }

    pub fn survivors(&self) -> Vec<TrackId> {
        self.entries.keys().copied().collect()
    }

    /// Every id scheduled for removal, grouped by survivor.
    pub fn duplicates(&self) -> Vec<TrackId> {
        self.entries.values().flatten().copied().collect()
    }

    pub fn duplicate_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl FromIterator<(TrackId, Vec<TrackId>)> for RemovalMap {
    fn from_iter<I: IntoIterator<Item = (TrackId, Vec<TrackId>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Translate a snapshot index into a validated track id.
///
/// Logs a warning and returns `None` when the index is out of range or the
/// stored id is missing or malformed.
pub fn index_to_id(index: usize, tracks: &[TrackRecord]) -> Option<TrackId> {
    let Some(track) = tracks.get(index) else {
        warn!(
            "Index {} is out of bounds for a snapshot of {} tracks",
            index,
            tracks.len()
        );
        return None;
    };
    let id = TrackId::parse(&track.id);
    if id.is_none() {
        warn!("Malformed track id {:?} at index {}", track.id, index);
    }
    id
}

pub fn build_removal_map(resolutions: &[Resolution], tracks: &[TrackRecord]) -> RemovalMap {
    let survivors: Vec<Option<TrackId>> = resolutions
        .iter()
        .map(|r| index_to_id(r.survivor, tracks))
        .collect();
    let survivor_set: FxHashSet<TrackId> = survivors.iter().flatten().copied().collect();

    let mut entries: BTreeMap<TrackId, Vec<TrackId>> = BTreeMap::new();
    let mut claimed: FxHashSet<TrackId> = FxHashSet::default();

    for (resolution, survivor) in resolutions.iter().zip(survivors) {
        let Some(survivor) = survivor else {
            warn!(
                "Skipping group '{}': survivor id could not be resolved",
                resolution.group.key
            );
            continue;
        };
        if entries.contains_key(&survivor) {
            warn!(
                "Skipping group '{}': survivor {} already kept for another group",
                resolution.group.key, survivor
            );
            continue;
        }

        let mut duplicates = Vec::with_capacity(resolution.group.indices.len().saturating_sub(1));
        for &index in &resolution.group.indices {
            if index == resolution.survivor {
                continue;
            }
            let Some(id) = index_to_id(index, tracks) else {
                continue;
            };
            if id == survivor {
                continue;
            }
            if survivor_set.contains(&id) || !claimed.insert(id) {
                warn!(
                    "Track {} in group '{}' is already kept or claimed elsewhere, not removing",
                    id, resolution.group.key
                );
                continue;
            }
            duplicates.push(id);
        }
        entries.insert(survivor, duplicates);
    }

    RemovalMap { entries }
}
