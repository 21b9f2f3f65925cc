//! End-to-end runs: library deduplication and single-playlist cleanup.
//!
//! Non-destructive work (snapshot, grouping, resolution, remapping) happens
//! first. Each destructive phase sits behind a confirmation gate and commits
//! as one unit inside the store.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;

use crate::criteria::resolve_groups;
use crate::dump::{
    playlist_report, resolution_report, DumpWriter, BEST_IDS_FILE, DESTINATION_FILES_FILE,
    PLAYLIST_DATA_FILE, REMOVAL_CANDIDATES_FILE, RESOLUTIONS_FILE, SONG_DATA_FILE,
};
use crate::grouping::group_duplicates;
use crate::models::{BatchReport, DedupStats, Playlist, TrackId};
use crate::playlist::find_redundant_entries;
use crate::prompt::Confirm;
use crate::relocate::{relocate_files, RelocationReport};
use crate::remap::{build_removal_map, RemovalMap};
use crate::safety::validate_backup_dir;
use crate::store::LibraryStore;

#[derive(Clone, Debug)]
pub struct DedupOptions {
    /// Required unless `dry_run`
    pub backup_dir: Option<PathBuf>,
    /// Database being modified, for the backup folder safety check
    pub db_path: Option<PathBuf>,
    pub import_marker: String,
    pub dump_dir: PathBuf,
    /// Write the diagnostic JSON exports
    pub verbose_dump: bool,
    /// Stop after resolution
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    ReplaceInPlaylists,
    RelocateAndDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    NoDuplicates,
    DryRun,
    /// The operator declined the gate before this phase
    Cancelled(Phase),
    Completed,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub stats: DedupStats,
    pub removals: RemovalMap,
    pub repointed: Option<BatchReport<TrackId>>,
    pub relocation: Option<RelocationReport>,
    pub deleted: Option<BatchReport<TrackId>>,
}

impl RunSummary {
    fn new(outcome: RunOutcome, stats: DedupStats) -> Self {
        Self {
            outcome,
            stats,
            removals: RemovalMap::default(),
            repointed: None,
            relocation: None,
            deleted: None,
        }
    }
}

fn report_batch<T: std::fmt::Display>(phase: &str, report: &BatchReport<T>) {
    info!(
        "{}: {} items, {} rows affected",
        phase,
        report.succeeded.len(),
        report.rows_affected
    );
    if report.is_complete() {
        return;
    }
    for failure in &report.failed {
        warn!("{}: {} not processed: {}", phase, failure.item, failure.error);
    }
}

/// Deduplicate the whole library.
pub fn deduplicate_library<S, C>(store: &mut S, confirm: &mut C, options: &DedupOptions) -> Result<RunSummary>
where
    S: LibraryStore + ?Sized,
    C: Confirm + ?Sized,
{
    let dump = DumpWriter::new(&options.dump_dir);

    let tracks = store.fetch_all_tracks().context("Failed to read tracks")?;
    info!("Loaded {} songs", tracks.len());
    if options.verbose_dump {
        dump.write_json(SONG_DATA_FILE, &tracks)?;
        let playlists = store.fetch_playlists().context("Failed to read playlists")?;
        dump.write_json(PLAYLIST_DATA_FILE, &playlist_report(&*store, &playlists)?)?;
    }

    let groups = group_duplicates(&tracks);
    info!("{} duplicate tracks found", groups.len());
    if groups.is_empty() {
        info!("No duplicates were found, exiting");
        return Ok(RunSummary::new(
            RunOutcome::NoDuplicates,
            DedupStats {
                total_tracks: tracks.len(),
                ..DedupStats::default()
            },
        ));
    }

    let (resolutions, stats) = resolve_groups(&groups, &tracks, &options.import_marker);
    let removals = build_removal_map(&resolutions, &tracks);
    stats.print_summary();
    stats.log_phase("resolve");
    info!(
        "{} groups resolved, {} songs scheduled for removal",
        stats.resolved(),
        removals.duplicate_count()
    );
    if options.verbose_dump {
        dump.write_json(BEST_IDS_FILE, &removals)?;
        dump.write_json(RESOLUTIONS_FILE, &resolution_report(&resolutions, &tracks))?;
    }

    let mut summary = RunSummary::new(RunOutcome::DryRun, stats);
    summary.removals = removals;
    if options.dry_run {
        info!("Dry run, no changes made");
        return Ok(summary);
    }

    let Some(backup_dir) = options.backup_dir.as_deref() else {
        bail!("No backup folder configured (set move_files_folder in config.json or pass --backup-dir)");
    };

    // Phase 1: playlists
    if !confirm.confirm("Proceed with deduplication? Duplicates will be replaced in playlists")? {
        info!("Cancelled before replacing songs in playlists");
        summary.outcome = RunOutcome::Cancelled(Phase::ReplaceInPlaylists);
        return Ok(summary);
    }
    let repointed = store
        .repoint_playlist_references(&summary.removals)
        .context("Failed to replace songs in playlists")?;
    report_batch("Replace songs in playlists", &repointed);

    // Duplicates of a survivor whose repoint failed are still referenced
    let to_remove = summary.removals.duplicates_of(&repointed.succeeded);
    summary.repointed = Some(repointed);
    info!("{} songs to remove", to_remove.len());
    if options.verbose_dump {
        if let Err(e) = dump.write_json(REMOVAL_CANDIDATES_FILE, &to_remove) {
            warn!("Could not export removal candidates: {:#}", e);
        }
    }
    if to_remove.is_empty() {
        summary.outcome = RunOutcome::Completed;
        return Ok(summary);
    }

    // Phase 2: files and rows
    if !confirm.confirm("Proceed with relocation of duplicate song files and removal from the database?")? {
        info!("Cancelled before relocating files");
        summary.outcome = RunOutcome::Cancelled(Phase::RelocateAndDelete);
        return Ok(summary);
    }

    let paths: Vec<PathBuf> = store
        .fetch_file_paths(&to_remove)
        .context("Failed to retrieve file paths")?
        .into_iter()
        .map(|(_, path)| PathBuf::from(path))
        .collect();
    validate_backup_dir(backup_dir, options.db_path.as_deref(), &paths)?;

    let relocation = relocate_files(&paths, backup_dir)?;
    if let Err(e) = dump.write_json(DESTINATION_FILES_FILE, &relocation.destinations()) {
        warn!("Could not export moved file list: {:#}", e);
    }
    summary.relocation = Some(relocation);

    let deleted = store
        .delete_track_records(&to_remove)
        .context("Failed to delete songs")?;
    report_batch("Delete songs", &deleted);
    summary.deleted = Some(deleted);

    summary.outcome = RunOutcome::Completed;
    Ok(summary)
}

#[derive(Debug, Serialize)]
pub struct PlaylistDedupSummary {
    pub playlist_id: String,
    pub entries: usize,
    pub redundant: Vec<i64>,
    /// `None` when nothing was redundant or the operator cancelled
    pub removed: Option<BatchReport<i64>>,
}

impl PlaylistDedupSummary {
    pub fn removed_count(&self) -> usize {
        self.removed.as_ref().map_or(0, |r| r.rows_affected)
    }
}

/// Remove repeated references to the same track from one manual playlist.
pub fn deduplicate_playlist<S, C>(store: &mut S, confirm: &mut C, playlist: &Playlist) -> Result<PlaylistDedupSummary>
where
    S: LibraryStore + ?Sized,
    C: Confirm + ?Sized,
{
    if !playlist.is_manual() {
        bail!(
            "Playlist '{}' is not a manually managed playlist ({:?})",
            playlist.name,
            playlist.kind
        );
    }
    info!("Deduplicating playlist id {} - {}", playlist.id, playlist.name);

    let entries = store
        .fetch_playlist_entries(&playlist.id)
        .with_context(|| format!("Failed to read entries of playlist {}", playlist.id))?;
    let redundant = find_redundant_entries(&entries);
    info!(
        "{} of {} entries are repeated references",
        redundant.len(),
        entries.len()
    );

    let mut summary = PlaylistDedupSummary {
        playlist_id: playlist.id.clone(),
        entries: entries.len(),
        redundant,
        removed: None,
    };
    if summary.redundant.is_empty() {
        return Ok(summary);
    }
    if !confirm.confirm(&format!(
        "Remove {} duplicate entries from '{}'?",
        summary.redundant.len(),
        playlist.name
    ))? {
        info!("Cancelled, playlist unchanged");
        return Ok(summary);
    }

    let removed = store
        .delete_playlist_entries(&summary.redundant)
        .context("Failed to delete playlist entries")?;
    report_batch("Delete playlist entries", &removed);
    summary.removed = Some(removed);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlaylistKind, DEVICE_IMPORT_MARKER};
    use crate::prompt::AutoConfirm;
    use crate::store::test_support::*;
    use crate::store::RekordboxStore;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        store: RekordboxStore,
    }

    impl Fixture {
        fn music(&self, name: &str) -> PathBuf {
            self.root.path().join("Music").join(name)
        }

        fn backup(&self) -> PathBuf {
            self.root.path().join("backup")
        }

        fn options(&self) -> DedupOptions {
            DedupOptions {
                backup_dir: Some(self.backup()),
                db_path: None,
                import_marker: DEVICE_IMPORT_MARKER.to_string(),
                dump_dir: self.root.path().join("data"),
                verbose_dump: false,
                dry_run: false,
            }
        }

        fn count(&self, sql: &str) -> i64 {
            count(self.store.connection(), sql)
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
    }

    /// Library with two duplicate groups:
    /// - "Burial - Archangel": 101 (128 kbps) and 102 (320 kbps) → keep 102
    /// - "Actress - R.I.P.": 201 imported, 202 local, same bit rate → keep 202
    /// plus a unique track 301.
    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let conn = create_test_db();
        insert_artist(&conn, "a1", "Burial");
        insert_artist(&conn, "a2", "Actress");

        let tracks = [
            ("101", "a1", "Archangel", 128, "Archangel.mp3"),
            ("102", "a1", "Archangel", 320, "Archangel (HQ).mp3"),
            ("201", "a2", "R.I.P.", 320, "Imported from Device/RIP.mp3"),
            ("202", "a2", "R.I.P.", 320, "Local/RIP.mp3"),
            ("301", "a2", "Hubble", 320, "Hubble.mp3"),
        ];
        for (id, artist, title, bit_rate, file) in tracks {
            let path = root.path().join("Music").join(file);
            touch(&path);
            insert_track(
                &conn,
                id,
                artist,
                title,
                bit_rate,
                &path.to_string_lossy(),
                "2023-01-15 10:00:00.000 +00:00",
            );
        }

        insert_playlist(&conn, "p1", 1, "Peak Time", 0);
        insert_playlist(&conn, "p2", 2, "Recently Added", 4);
        insert_entry(&conn, "1", "p1", "101", 1);
        insert_entry(&conn, "2", "p1", "201", 2);
        insert_entry(&conn, "3", "p1", "301", 3);

        Fixture {
            root,
            store: RekordboxStore::from_connection(conn),
        }
    }

    #[test]
    fn test_full_run() {
        let mut fx = fixture();
        let options = fx.options();
        let summary = deduplicate_library(&mut fx.store, &mut AutoConfirm, &options).unwrap();

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.stats.highest_bitrate, 1);
        assert_eq!(summary.stats.remove_imported, 1);
        assert_eq!(summary.removals.get(TrackId(102)), Some(&[TrackId(101)][..]));
        assert_eq!(summary.removals.get(TrackId(202)), Some(&[TrackId(201)][..]));

        // Playlist now points at survivors
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdSongPlaylist WHERE ContentID IN ('102', '202')"), 2);
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdSongPlaylist WHERE ContentID IN ('101', '201')"), 0);

        // Duplicate rows removed, survivors kept
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdContent"), 3);
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdContent WHERE ID IN ('101', '201')"), 0);

        // Files moved; both named RIP.mp3 would collide but only one is discarded
        let relocation = summary.relocation.unwrap();
        assert_eq!(relocation.moved.len(), 2);
        assert!(fx.backup().join("Archangel.mp3").exists());
        assert!(fx.backup().join("RIP.mp3").exists());
        assert!(!fx.music("Archangel.mp3").exists());
        assert!(fx.music("Local/RIP.mp3").exists());

        let exported = fs::read_to_string(fx.root.path().join("data").join(DESTINATION_FILES_FILE)).unwrap();
        let exported: Vec<PathBuf> = serde_json::from_str(&exported).unwrap();
        assert_eq!(exported.len(), 2);

        assert_eq!(summary.deleted.unwrap().rows_affected, 2);
    }

    #[test]
    fn test_no_duplicates_exits_early() {
        let conn = create_test_db();
        insert_artist(&conn, "a1", "Burial");
        insert_track(&conn, "1", "a1", "Archangel", 320, "/a.mp3", "");
        insert_track(&conn, "2", "a1", "Endorphin", 320, "/b.mp3", "");
        let mut store = RekordboxStore::from_connection(conn);
        let root = tempfile::tempdir().unwrap();
        let options = DedupOptions {
            backup_dir: None,
            db_path: None,
            import_marker: DEVICE_IMPORT_MARKER.to_string(),
            dump_dir: root.path().join("data"),
            verbose_dump: false,
            dry_run: false,
        };
        let mut gate = |_: &str| -> bool { panic!("no gate expected") };

        let summary = deduplicate_library(&mut store, &mut gate, &options).unwrap();
        assert_eq!(summary.outcome, RunOutcome::NoDuplicates);
        assert_eq!(summary.stats.total_tracks, 2);
        assert!(summary.removals.is_empty());
    }

    #[test]
    fn test_cancel_before_playlists_changes_nothing() {
        let mut fx = fixture();
        let options = fx.options();
        let mut gate = |_: &str| false;

        let summary = deduplicate_library(&mut fx.store, &mut gate, &options).unwrap();
        assert_eq!(summary.outcome, RunOutcome::Cancelled(Phase::ReplaceInPlaylists));
        assert!(summary.repointed.is_none());
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdSongPlaylist WHERE ContentID = '101'"), 1);
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdContent"), 5);
        assert!(!fx.backup().exists());
    }

    #[test]
    fn test_cancel_before_relocation_keeps_playlist_changes() {
        let mut fx = fixture();
        let options = fx.options();
        let mut answers = vec![true, false].into_iter();
        let mut gate = move |_: &str| answers.next().unwrap_or(false);

        let summary = deduplicate_library(&mut fx.store, &mut gate, &options).unwrap();
        assert_eq!(summary.outcome, RunOutcome::Cancelled(Phase::RelocateAndDelete));
        assert_eq!(summary.repointed.as_ref().unwrap().rows_affected, 2);
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdSongPlaylist WHERE ContentID = '102'"), 1);
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdContent"), 5);
        assert!(fx.music("Archangel.mp3").exists());
        assert!(summary.relocation.is_none());
    }

    #[test]
    fn test_dry_run_with_dump() {
        let mut fx = fixture();
        let mut options = fx.options();
        options.dry_run = true;
        options.verbose_dump = true;
        options.backup_dir = None;

        let summary = deduplicate_library(&mut fx.store, &mut AutoConfirm, &options).unwrap();
        assert_eq!(summary.outcome, RunOutcome::DryRun);
        assert_eq!(summary.removals.duplicate_count(), 2);

        let data = fx.root.path().join("data");
        for file in [SONG_DATA_FILE, PLAYLIST_DATA_FILE, BEST_IDS_FILE, RESOLUTIONS_FILE] {
            assert!(data.join(file).exists(), "missing {}", file);
        }
        let best: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(data.join(BEST_IDS_FILE)).unwrap()).unwrap();
        assert_eq!(best["102"][0], 101);
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdContent"), 5);
    }

    #[test]
    fn test_missing_backup_dir_fails_before_changes() {
        let mut fx = fixture();
        let mut options = fx.options();
        options.backup_dir = None;

        let result = deduplicate_library(&mut fx.store, &mut AutoConfirm, &options);
        assert!(result.is_err());
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdSongPlaylist WHERE ContentID = '101'"), 1);
    }

    #[test]
    fn test_missing_file_still_deletes_row() {
        let mut fx = fixture();
        fs::remove_file(fx.music("Archangel.mp3")).unwrap();
        let options = fx.options();

        let summary = deduplicate_library(&mut fx.store, &mut AutoConfirm, &options).unwrap();
        let relocation = summary.relocation.unwrap();
        assert_eq!(relocation.moved.len(), 1);
        assert_eq!(relocation.failed.len(), 1);
        assert_eq!(relocation.failed[0].path, fx.music("Archangel.mp3"));
        assert_eq!(summary.deleted.unwrap().succeeded.len(), 2);
    }

    #[test]
    fn test_failed_repoint_keeps_duplicates() {
        let mut fx = fixture();
        fx.store
            .connection()
            .execute_batch(
                "CREATE TRIGGER protect_101 BEFORE UPDATE ON djmdSongPlaylist
                 WHEN OLD.ContentID = '101'
                 BEGIN SELECT RAISE(ABORT, 'entry is locked'); END;",
            )
            .unwrap();
        let options = fx.options();

        let summary = deduplicate_library(&mut fx.store, &mut AutoConfirm, &options).unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        let repointed = summary.repointed.unwrap();
        assert_eq!(repointed.succeeded, vec![TrackId(202)]);
        assert_eq!(repointed.failed[0].item, TrackId(102));

        // 101 is still referenced, so its row and file stay
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdSongPlaylist WHERE ContentID = '101'"), 1);
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdContent WHERE ID = '101'"), 1);
        assert!(fx.music("Archangel.mp3").exists());

        // The other group still completes
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdContent WHERE ID = '201'"), 0);
        assert_eq!(summary.relocation.unwrap().moved.len(), 1);
        assert_eq!(summary.deleted.unwrap().succeeded, vec![TrackId(201)]);
    }

    #[test]
    fn test_unwritable_export_still_deletes_rows() {
        let mut fx = fixture();
        let blocker = fx.root.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let mut options = fx.options();
        options.dump_dir = blocker.join("data");

        let summary = deduplicate_library(&mut fx.store, &mut AutoConfirm, &options).unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.relocation.unwrap().moved.len(), 2);
        assert_eq!(fx.count("SELECT COUNT(*) FROM djmdContent WHERE ID IN ('101', '201')"), 0);
        assert!(fx.backup().join("Archangel.mp3").exists());
    }

    #[test]
    fn test_deduplicate_playlist() {
        let conn = create_test_db();
        insert_playlist(&conn, "p1", 1, "Peak Time", 0);
        insert_entry(&conn, "1", "p1", "A", 1);
        insert_entry(&conn, "2", "p1", "B", 2);
        insert_entry(&conn, "3", "p1", "A", 3);
        let mut store = RekordboxStore::from_connection(conn);
        let playlist = store.fetch_non_smart_playlists().unwrap().remove(0);

        let summary = deduplicate_playlist(&mut store, &mut AutoConfirm, &playlist).unwrap();
        assert_eq!(summary.redundant, vec![3]);
        assert_eq!(summary.removed_count(), 1);
        let remaining: Vec<i64> = store
            .fetch_playlist_entries("p1")
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(remaining, vec![1, 2]);
    }

    #[test]
    fn test_deduplicate_playlist_cancelled() {
        let conn = create_test_db();
        insert_playlist(&conn, "p1", 1, "Peak Time", 0);
        insert_entry(&conn, "1", "p1", "A", 1);
        insert_entry(&conn, "2", "p1", "A", 2);
        let mut store = RekordboxStore::from_connection(conn);
        let playlist = store.fetch_non_smart_playlists().unwrap().remove(0);

        let mut gate = |_: &str| false;
        let summary = deduplicate_playlist(&mut store, &mut gate, &playlist).unwrap();
        assert_eq!(summary.redundant, vec![2]);
        assert_eq!(summary.removed_count(), 0);
        assert_eq!(store.fetch_playlist_entries("p1").unwrap().len(), 2);
    }

    #[test]
    fn test_smart_playlist_refused() {
        let mut store = RekordboxStore::from_connection(create_test_db());
        let smart = Playlist {
            id: "p9".to_string(),
            name: "Recently Added".to_string(),
            kind: PlaylistKind::Smart,
        };
        assert!(deduplicate_playlist(&mut store, &mut AutoConfirm, &smart).is_err());
    }
}
