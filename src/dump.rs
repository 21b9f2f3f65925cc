//! JSON diagnostic exports.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::models::{Criterion, Playlist, PlaylistKind, Resolution, TrackRecord};
use crate::store::LibraryStore;

pub const SONG_DATA_FILE: &str = "song_data.json";
pub const PLAYLIST_DATA_FILE: &str = "playlist_data.json";
pub const BEST_IDS_FILE: &str = "best_ids.json";
pub const RESOLUTIONS_FILE: &str = "resolutions.json";
pub const REMOVAL_CANDIDATES_FILE: &str = "removal_candidates.json";
pub const DESTINATION_FILES_FILE: &str = "destination_files.json";

pub struct DumpWriter {
    dir: PathBuf,
}

impl DumpWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Pretty-print `value` to `<dir>/<file_name>`, creating the directory.
    pub fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create dump folder {}", self.dir.display()))?;
        let path = self.dir.join(file_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Exported {}", path.display());
        Ok(path)
    }
}

#[derive(Debug, Serialize)]
pub struct PlaylistDump {
    pub id: String,
    pub index: usize,
    pub name: String,
    pub kind: PlaylistKind,
    pub track_ids: Vec<String>,
}

/// Every playlist with the track ids it references, in playlist order.
pub fn playlist_report<S: LibraryStore + ?Sized>(store: &S, playlists: &[Playlist]) -> Result<Vec<PlaylistDump>> {
    playlists
        .iter()
        .enumerate()
        .map(|(index, playlist)| {
            let entries = store.fetch_playlist_entries(&playlist.id)?;
            Ok(PlaylistDump {
                id: playlist.id.clone(),
                index,
                name: playlist.name.clone(),
                kind: playlist.kind,
                track_ids: entries.into_iter().map(|e| e.track_id).collect(),
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ResolutionDump<'a> {
    pub key: &'a str,
    pub criterion: Criterion,
    pub survivor_id: &'a str,
    pub member_ids: Vec<&'a str>,
}

/// Human-readable view of every resolution using raw stored ids.
pub fn resolution_report<'a>(resolutions: &'a [Resolution], tracks: &'a [TrackRecord]) -> Vec<ResolutionDump<'a>> {
    let raw_id = move |index: usize| tracks.get(index).map_or("", |t| t.id.as_str());
    resolutions
        .iter()
        .map(|r| ResolutionDump {
            key: &r.group.key,
            criterion: r.criterion,
            survivor_id: raw_id(r.survivor),
            member_ids: r.group.indices.iter().map(|&i| raw_id(i)).collect(),
        })
        .collect()
}
