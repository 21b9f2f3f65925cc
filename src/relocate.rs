//! Move discarded audio files into the backup folder.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::progress::{create_progress_bar, log_progress};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MovedFile {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Clone, Debug, Serialize)]
pub struct FailedMove {
    pub path: PathBuf,
    pub error: String,
}

/// What was and was not moved. Always accurate, even after partial failure.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RelocationReport {
    pub moved: Vec<MovedFile>,
    pub failed: Vec<FailedMove>,
}

impl RelocationReport {
    pub fn destinations(&self) -> Vec<&Path> {
        self.moved.iter().map(|m| m.to.as_path()).collect()
    }
}

/// First free path for `file_name` in `dir`: `name.ext`, then `name (1).ext`, `name (2).ext`, ...
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter = 1u32;
    loop {
        let candidate = match &extension {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, counter, ext)),
            None => dir.join(format!("{} ({})", stem, counter)),
        };
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(_) => copy_then_remove(from, to),
    }
}

/// Copy `from` to `to`, then remove `from`. On failure `to` is cleaned up
/// so the source remains the only copy.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    if let Err(e) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    if let Err(e) = fs::remove_file(from) {
        if let Err(cleanup) = fs::remove_file(to) {
            warn!("Could not remove partial copy {}: {}", to.display(), cleanup);
        }
        return Err(e);
    }
    Ok(())
}

/// Move every file into `destination`, skipping (and recording) failures.
///
/// Only failure to create the destination folder aborts the phase.
pub fn relocate_files<P: AsRef<Path>>(paths: &[P], destination: &Path) -> Result<RelocationReport> {
    fs::create_dir_all(destination)
        .with_context(|| format!("Failed to create backup folder {}", destination.display()))?;

    let pb = create_progress_bar(paths.len() as u64, "Moving files");
    let mut report = RelocationReport::default();

    for (i, path) in paths.iter().enumerate() {
        let from = path.as_ref();
        let outcome = match from.file_name() {
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")),
            Some(_) if !from.is_file() => Err(io::Error::new(io::ErrorKind::NotFound, "file not found")),
            Some(name) => {
                let to = unique_destination(destination, name);
                move_file(from, &to).map(|()| to)
            }
        };

        match outcome {
            Ok(to) => report.moved.push(MovedFile {
                from: from.to_path_buf(),
                to,
            }),
            Err(e) => {
                warn!("Error moving {}: {}", from.display(), e);
                report.failed.push(FailedMove {
                    path: from.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
        pb.inc(1);
        log_progress("move", i as u64 + 1, paths.len() as u64, 500);
    }

    pb.finish_with_message(format!("Moved {} files", report.moved.len()));
    info!(
        "Moved {} files to {} ({} not moved)",
        report.moved.len(),
        destination.display(),
        report.failed.len()
    );
    Ok(report)
}
