//! Core data models for library deduplication.
//!
//! This module contains the value types shared by the grouping, selection
//! and store layers. Records are mapped from database rows once at the store
//! boundary and never mutated afterwards.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Validated numeric track identifier (`djmdContent.ID`).
///
/// Rekordbox stores IDs as text; only values that parse as integers are
/// accepted as ids for the removal map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl TrackId {
    /// Parse a raw stored identifier. Returns `None` for empty or non-numeric values.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<i64>().ok().map(TrackId)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Track Models
// ============================================================================

/// Default path marker for files imported from a USB device or phone.
pub const DEVICE_IMPORT_MARKER: &str = "/Imported from Device/";

/// Snapshot of one library entry at decision time.
#[derive(Clone, Debug, Serialize)]
pub struct TrackRecord {
    /// Position in the snapshot (the "global index")
    pub index: usize,
    /// Raw stored identifier, validated later by `TrackId::parse`
    pub id: String,
    pub artist: String,
    pub title: String,
    /// `"{artist} - {title}"`, compared exactly
    pub identity_key: String,
    pub bit_rate: i64,
    pub folder_path: String,
    /// `None` when the stored timestamp could not be parsed
    pub created_at: Option<NaiveDateTime>,
}

impl TrackRecord {
    pub fn new(
        index: usize,
        id: impl Into<String>,
        artist: impl Into<String>,
        title: impl Into<String>,
        bit_rate: i64,
        folder_path: impl Into<String>,
        created_at: Option<NaiveDateTime>,
    ) -> Self {
        let artist = artist.into();
        let title = title.into();
        let identity_key = identity_key(&artist, &title);
        Self {
            index,
            id: id.into(),
            artist,
            title,
            identity_key,
            bit_rate,
            folder_path: folder_path.into(),
            created_at,
        }
    }

    /// Exact substring test against the folder path.
    pub fn is_device_import(&self, marker: &str) -> bool {
        self.folder_path.contains(marker)
    }
}

/// Build the identity key used to detect duplicates. No normalization.
pub fn identity_key(artist: &str, title: &str) -> String {
    format!("{} - {}", artist, title)
}

/// Parse a `created_at` value as stored by Rekordbox.
///
/// Accepts `2023-01-15 12:34:56.789 +00:00` (offset is folded into UTC),
/// the same without offset, and a bare date.
pub fn parse_created_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f %:z") {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Group of snapshot indices sharing one identity key (always ≥ 2 members).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub key: String,
    /// Global indices in ascending order
    pub indices: Vec<usize>,
}

// ============================================================================
// Resolution
// ============================================================================

/// Tie-break rule that decided a duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    HighestBitrate,
    RemoveImported,
    CreatedAt,
    FirstIndex,
}

impl Criterion {
    pub fn as_str(self) -> &'static str {
        match self {
            Criterion::HighestBitrate => "highest_bitrate",
            Criterion::RemoveImported => "remove_imported",
            Criterion::CreatedAt => "created_at",
            Criterion::FirstIndex => "first_index",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one duplicate group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub group: DuplicateGroup,
    /// Global index of the retained record
    pub survivor: usize,
    pub criterion: Criterion,
}

// ============================================================================
// Playlist Models
// ============================================================================

/// Playlist kind derived from `djmdPlaylist.Attribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaylistKind {
    Playlist,
    Folder,
    Smart,
    Unknown(i32),
}

impl From<i32> for PlaylistKind {
    fn from(attribute: i32) -> Self {
        match attribute {
            0 => PlaylistKind::Playlist,
            1 => PlaylistKind::Folder,
            4 => PlaylistKind::Smart,
            other => PlaylistKind::Unknown(other),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub kind: PlaylistKind,
}

impl Playlist {
    /// Manually managed playlists are the only ones eligible for intra-dedup.
    pub fn is_manual(&self) -> bool {
        self.kind == PlaylistKind::Playlist
    }
}

/// One reference from a playlist to a track (`djmdSongPlaylist` row).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlaylistEntry {
    /// Persisted reference id; lower means inserted earlier
    pub id: i64,
    pub position: i64,
    pub track_id: String,
}

// ============================================================================
// Batch Reports
// ============================================================================

#[derive(Clone, Debug, Serialize)]
pub struct ItemFailure<T> {
    pub item: T,
    pub error: String,
}

/// Per-item outcome of a destructive store phase.
#[derive(Clone, Debug, Serialize)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<ItemFailure<T>>,
    pub rows_affected: usize,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            rows_affected: 0,
        }
    }
}

impl<T> BatchReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, item: T, rows: usize) {
        self.succeeded.push(item);
        self.rows_affected += rows;
    }

    pub fn record_failure(&mut self, item: T, error: impl fmt::Display) {
        self.failed.push(ItemFailure {
            item,
            error: error.to_string(),
        });
    }

    /// True when no item failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-run resolution statistics. Reporting only.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub highest_bitrate: usize,
    pub remove_imported: usize,
    pub created_at: usize,
    pub first_index: usize,

    pub total_tracks: usize,
    pub total_groups: usize,
    pub total_duplicates: usize,
}

impl DedupStats {
    pub fn record(&mut self, criterion: Criterion) {
        match criterion {
            Criterion::HighestBitrate => self.highest_bitrate += 1,
            Criterion::RemoveImported => self.remove_imported += 1,
            Criterion::CreatedAt => self.created_at += 1,
            Criterion::FirstIndex => self.first_index += 1,
        }
    }

    pub fn count(&self, criterion: Criterion) -> usize {
        match criterion {
            Criterion::HighestBitrate => self.highest_bitrate,
            Criterion::RemoveImported => self.remove_imported,
            Criterion::CreatedAt => self.created_at,
            Criterion::FirstIndex => self.first_index,
        }
    }

    /// Total number of resolved groups
    pub fn resolved(&self) -> usize {
        self.highest_bitrate + self.remove_imported + self.created_at + self.first_index
    }

    /// Log stats in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            log::debug!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Print the summary table shown before the first confirmation gate.
    pub fn print_summary(&self) {
        println!("\n{:=<44}", "");
        println!("{:^44}", "Statistics Summary");
        println!("{:-<44}", "");
        for criterion in [
            Criterion::HighestBitrate,
            Criterion::RemoveImported,
            Criterion::CreatedAt,
            Criterion::FirstIndex,
        ] {
            println!("  {:<30} {:>10}", title_case(criterion.as_str()), self.count(criterion));
        }
        println!("{:-<44}", "");
        println!("  {:<30} {:>10}", "Tracks", self.total_tracks);
        println!("  {:<30} {:>10}", "Duplicate Groups", self.total_groups);
        println!("  {:<30} {:>10}", "Duplicates To Remove", self.total_duplicates);
        println!("{:=<44}\n", "");
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_parse() {
        assert_eq!(TrackId::parse("12345"), Some(TrackId(12345)));
        assert_eq!(TrackId::parse(" 42 "), Some(TrackId(42)));
        assert_eq!(TrackId::parse(""), None);
        assert_eq!(TrackId::parse("t1"), None);
    }

    #[test]
    fn test_identity_key_is_exact() {
        let a = TrackRecord::new(0, "1", "Burial", "Archangel", 320, "/a.mp3", None);
        let b = TrackRecord::new(1, "2", "burial", "Archangel", 320, "/b.mp3", None);
        assert_eq!(a.identity_key, "Burial - Archangel");
        assert_ne!(a.identity_key, b.identity_key);
    }

    #[test]
    fn test_device_import_marker_is_substring() {
        let t = TrackRecord::new(
            0,
            "1",
            "A",
            "B",
            320,
            "/Users/dj/Music/PioneerDJ/Imported from Device/Contents/b.mp3",
            None,
        );
        assert!(t.is_device_import(DEVICE_IMPORT_MARKER));
        assert!(!t.is_device_import("/Imported from Phone/"));
    }

    #[test]
    fn test_parse_created_at_formats() {
        let with_offset = parse_created_at("2023-01-15 12:34:56.789 +02:00").unwrap();
        assert_eq!(with_offset.to_string(), "2023-01-15 10:34:56.789");

        let naive = parse_created_at("2023-01-15 12:34:56.000123").unwrap();
        assert_eq!(naive.to_string(), "2023-01-15 12:34:56.000123");

        let date_only = parse_created_at("2023-01-15").unwrap();
        assert_eq!(date_only.to_string(), "2023-01-15 00:00:00");

        assert!(parse_created_at("").is_none());
        assert!(parse_created_at("yesterday").is_none());
    }

    #[test]
    fn test_playlist_kind_from_attribute() {
        assert_eq!(PlaylistKind::from(0), PlaylistKind::Playlist);
        assert_eq!(PlaylistKind::from(1), PlaylistKind::Folder);
        assert_eq!(PlaylistKind::from(4), PlaylistKind::Smart);
        assert_eq!(PlaylistKind::from(7), PlaylistKind::Unknown(7));
    }

    #[test]
    fn test_stats_record_and_resolved() {
        let mut stats = DedupStats::default();
        stats.record(Criterion::HighestBitrate);
        stats.record(Criterion::HighestBitrate);
        stats.record(Criterion::FirstIndex);
        assert_eq!(stats.highest_bitrate, 2);
        assert_eq!(stats.first_index, 1);
        assert_eq!(stats.resolved(), 3);
    }

    #[test]
    fn test_batch_report() {
        let mut report: BatchReport<TrackId> = BatchReport::new();
        report.record_success(TrackId(1), 2);
        report.record_success(TrackId(2), 0);
        assert!(report.is_complete());
        report.record_failure(TrackId(3), "constraint failed");
        assert!(!report.is_complete());
        assert_eq!(report.rows_affected, 2);
        assert_eq!(report.failed[0].error, "constraint failed");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("highest_bitrate"), "Highest Bitrate");
        assert_eq!(title_case("first_index"), "First Index");
    }
}
