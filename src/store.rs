//! Library store: the Rekordbox `master.db` behind a narrow trait.
//!
//! Reads map rows into plain value types at this boundary. Each destructive
//! operation runs in one transaction with a savepoint per item, so a failing
//! item is rolled back alone and reported while the rest commit together.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use rusqlite::{params, params_from_iter, Connection};
use rustc_hash::FxHashMap;
use std::fmt::Display;
use std::path::Path;

use crate::models::{parse_created_at, BatchReport, Playlist, PlaylistEntry, TrackId, TrackRecord};
use crate::progress::{create_progress_bar, log_progress};
use crate::remap::RemovalMap;

/// The universal Rekordbox 6/7 SQLCipher key (publicly known, same for all installations).
const DB_KEY: &str = "402fd482c38817c35ffa8ffb8c7d93143b749e7d315df7a81732a1ff43608497";

/// Upper bound on bound parameters per `IN (...)` query
const QUERY_BATCH_SIZE: usize = 500;

pub trait LibraryStore {
    /// Point-in-time snapshot of every live track, in storage order.
    fn fetch_all_tracks(&self) -> Result<Vec<TrackRecord>>;

    fn fetch_playlists(&self) -> Result<Vec<Playlist>>;

    /// Manually managed playlists only (no smart playlists or folders).
    fn fetch_non_smart_playlists(&self) -> Result<Vec<Playlist>> {
        Ok(self
            .fetch_playlists()?
            .into_iter()
            .filter(Playlist::is_manual)
            .collect())
    }

    fn fetch_playlist_entries(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>>;

    /// File paths of the given tracks, in the order of `ids`. Unknown ids are skipped.
    fn fetch_file_paths(&self, ids: &[TrackId]) -> Result<Vec<(TrackId, String)>>;

    /// Point playlist references at each survivor instead of its duplicates.
    fn repoint_playlist_references(&mut self, removals: &RemovalMap) -> Result<BatchReport<TrackId>>;

    fn delete_track_records(&mut self, ids: &[TrackId]) -> Result<BatchReport<TrackId>>;

    fn delete_playlist_entries(&mut self, ids: &[i64]) -> Result<BatchReport<i64>>;
}

pub struct RekordboxStore {
    conn: Connection,
}

impl RekordboxStore {
    /// Open a Rekordbox database and verify it is readable.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Database not found: {}", path.display());
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        // Ignored by plain SQLite builds; required for encrypted master.db
        conn.execute_batch(&format!("PRAGMA key = '{DB_KEY}'"))
            .context("Failed to apply database key")?;
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))
            .context("Failed to read database schema (encrypted databases need the `sqlcipher` feature)")?;
        info!("Opened database {}", path.display());
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Run `op` once per item inside its own savepoint of a single transaction.
fn run_batch<T, F>(conn: &mut Connection, phase: &str, items: &[T], mut op: F) -> Result<BatchReport<T>>
where
    T: Copy + Display,
    F: FnMut(&Connection, T) -> rusqlite::Result<usize>,
{
    let mut tx = conn
        .transaction()
        .with_context(|| format!("Failed to begin transaction for {}", phase))?;
    let pb = create_progress_bar(items.len() as u64, phase);
    let mut report = BatchReport::new();

    for (i, &item) in items.iter().enumerate() {
        let sp = tx
            .savepoint()
            .with_context(|| format!("Failed to create savepoint for {}", phase))?;
        match op(&sp, item) {
            Ok(rows) => {
                sp.commit()
                    .with_context(|| format!("Failed to release savepoint for {}", phase))?;
                report.record_success(item, rows);
            }
            Err(e) => {
                // Dropping the savepoint rolls back this item only
                drop(sp);
                warn!("{}: {} failed: {}", phase, item, e);
                report.record_failure(item, e);
            }
        }
        pb.inc(1);
        log_progress(phase, i as u64 + 1, items.len() as u64, 1_000);
    }

    tx.commit()
        .with_context(|| format!("Failed to commit {}", phase))?;
    pb.finish_with_message(format!(
        "{}: {} ok, {} failed, {} rows",
        phase,
        report.succeeded.len(),
        report.failed.len(),
        report.rows_affected
    ));
    Ok(report)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl LibraryStore for RekordboxStore {
    fn fetch_all_tracks(&self) -> Result<Vec<TrackRecord>> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM djmdContent WHERE COALESCE(rb_local_deleted, 0) = 0",
                [],
                |row| row.get(0),
            )
            .context("Failed to count tracks")?;

        let pb = create_progress_bar(count as u64, "Reading tracks");
        let mut stmt = self.conn.prepare(
            "SELECT
                COALESCE(CAST(c.ID AS TEXT), ''),
                COALESCE(a.Name, ''),
                COALESCE(c.Title, ''),
                CAST(COALESCE(c.BitRate, 0) AS INTEGER),
                COALESCE(c.FolderPath, ''),
                COALESCE(CAST(c.created_at AS TEXT), '')
             FROM djmdContent c
             LEFT JOIN djmdArtist a ON c.ArtistID = a.ID
             WHERE COALESCE(c.rb_local_deleted, 0) = 0
             ORDER BY c.rowid",
        )?;

        let mut tracks = Vec::with_capacity(count as usize);
        let mut unparsed = 0usize;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let created_raw: String = row.get(5)?;
            let created_at = parse_created_at(&created_raw);
            if created_at.is_none() {
                debug!("Unparseable created_at {:?}", created_raw);
                unparsed += 1;
            }
            let index = tracks.len();
            tracks.push(TrackRecord::new(
                index,
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get(3)?,
                row.get::<_, String>(4)?,
                created_at,
            ));
            pb.inc(1);
        }

        if unparsed > 0 {
            warn!("{} tracks have an unparseable created_at", unparsed);
        }
        pb.finish_with_message(format!("Read {} tracks", tracks.len()));
        Ok(tracks)
    }

    fn fetch_playlists(&self) -> Result<Vec<Playlist>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                COALESCE(CAST(ID AS TEXT), ''),
                COALESCE(Name, ''),
                COALESCE(Attribute, 0)
             FROM djmdPlaylist
             WHERE COALESCE(rb_local_deleted, 0) = 0
             ORDER BY Seq",
        )?;
        let rows = stmt.query_map([], |row| {
            let attribute: i32 = row.get(2)?;
            Ok(Playlist {
                id: row.get(0)?,
                name: row.get(1)?,
                kind: attribute.into(),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read playlists")
    }

    fn fetch_playlist_entries(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                COALESCE(CAST(ID AS TEXT), ''),
                COALESCE(TrackNo, 0),
                COALESCE(CAST(ContentID AS TEXT), '')
             FROM djmdSongPlaylist
             WHERE PlaylistID = ?1
             ORDER BY TrackNo",
        )?;
        let mut rows = stmt.query(params![playlist_id])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let raw_id: String = row.get(0)?;
            let Ok(id) = raw_id.trim().parse::<i64>() else {
                warn!("Skipping playlist entry with malformed id {:?}", raw_id);
                continue;
            };
            entries.push(PlaylistEntry {
                id,
                position: row.get(1)?,
                track_id: row.get(2)?,
            });
        }
        Ok(entries)
    }

    fn fetch_file_paths(&self, ids: &[TrackId]) -> Result<Vec<(TrackId, String)>> {
        let mut found: FxHashMap<String, String> = FxHashMap::default();
        for chunk in ids.chunks(QUERY_BATCH_SIZE) {
            let sql = format!(
                "SELECT CAST(ID AS TEXT), COALESCE(FolderPath, '') FROM djmdContent WHERE ID IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter().map(|id| id.to_string())))?;
            while let Some(row) = rows.next()? {
                found.insert(row.get(0)?, row.get(1)?);
            }
        }

        let mut paths = Vec::with_capacity(ids.len());
        for &id in ids {
            match found.remove(&id.to_string()) {
                Some(path) => paths.push((id, path)),
                None => warn!("No file path found for track {}", id),
            }
        }
        info!("Found {} file paths for {} tracks", paths.len(), ids.len());
        Ok(paths)
    }

    fn repoint_playlist_references(&mut self, removals: &RemovalMap) -> Result<BatchReport<TrackId>> {
        let survivors = removals.survivors();
        run_batch(&mut self.conn, "Replacing songs in playlists", &survivors, |conn, survivor| {
            let duplicates = removals.get(survivor).unwrap_or_default();
            if duplicates.is_empty() {
                return Ok(0);
            }
            let sql = format!(
                "UPDATE djmdSongPlaylist SET ContentID = ? WHERE ContentID IN ({})",
                placeholders(duplicates.len())
            );
            let values = std::iter::once(survivor)
                .chain(duplicates.iter().copied())
                .map(|id| id.to_string());
            conn.execute(&sql, params_from_iter(values))
        })
    }

    fn delete_track_records(&mut self, ids: &[TrackId]) -> Result<BatchReport<TrackId>> {
        run_batch(&mut self.conn, "Deleting songs", ids, |conn, id| {
            conn.execute("DELETE FROM djmdContent WHERE ID = ?1", params![id.to_string()])
        })
    }

    fn delete_playlist_entries(&mut self, ids: &[i64]) -> Result<BatchReport<i64>> {
        run_batch(&mut self.conn, "Deleting playlist entries", ids, |conn, id| {
            conn.execute("DELETE FROM djmdSongPlaylist WHERE ID = ?1", params![id.to_string()])
        })
    }
}
