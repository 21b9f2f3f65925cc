//! Safety checks before files are moved out of the library.
//!
//! These guard against a backup folder that would overwrite the database or
//! leave files where they already are.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that `backup_dir` is a sensible relocation target.
///
/// Checks:
/// - The path is not an existing regular file
/// - It is neither the database file nor the folder holding it
/// - No file being relocated already lives directly in it
///
/// # Arguments
/// * `backup_dir` - Folder that will receive the relocated files
/// * `db_path` - Database being modified, if known
/// * `sources` - Files about to be relocated
pub fn validate_backup_dir<P: AsRef<Path>>(
    backup_dir: &Path,
    db_path: Option<&Path>,
    sources: &[P],
) -> Result<()> {
    if backup_dir.as_os_str().is_empty() {
        bail!("Safety check failed: backup folder is empty");
    }

    if backup_dir.is_file() {
        bail!(
            "Safety check failed: backup folder '{}' is an existing file",
            backup_dir.display()
        );
    }

    if let Some(db) = db_path {
        if backup_dir == db || db.parent() == Some(backup_dir) {
            bail!(
                "Safety check failed: backup folder '{}' cannot be the database location '{}'",
                backup_dir.display(),
                db.display()
            );
        }
    }

    for source in sources {
        let source = source.as_ref();
        if source.parent() == Some(backup_dir) {
            bail!(
                "Safety check failed: '{}' is already in backup folder '{}'",
                source.display(),
                backup_dir.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_backup_dir() {
        let backup = PathBuf::from("/Volumes/Backup/duplicates");
        let db = PathBuf::from("/Users/dj/Library/Pioneer/rekordbox/master.db");
        let sources = [PathBuf::from("/Users/dj/Music/a.mp3")];
        assert!(validate_backup_dir(&backup, Some(db.as_path()), &sources).is_ok());
    }

    #[test]
    fn test_database_folder_rejected() {
        let db = PathBuf::from("/Users/dj/Library/Pioneer/rekordbox/master.db");
        let backup = PathBuf::from("/Users/dj/Library/Pioneer/rekordbox");
        let result = validate_backup_dir::<PathBuf>(&backup, Some(db.as_path()), &[]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the database location"));
    }

    #[test]
    fn test_source_already_in_backup_rejected() {
        let backup = PathBuf::from("/Users/dj/Music");
        let sources = [PathBuf::from("/Users/dj/Music/a.mp3")];
        let result = validate_backup_dir(&backup, None, &sources);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already in backup folder"));
    }

    #[test]
    fn test_existing_file_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = validate_backup_dir::<PathBuf>(file.path(), None, &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(validate_backup_dir::<PathBuf>(Path::new(""), None, &[]).is_err());
    }
}
