//! Rarity backup rotation.
//!
//! Before the rarity file is overwritten, the previous copy is moved into the
//! backups directory under a timestamped name. Only the newest backups are
//! kept so that a long editing session does not bloat the project.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use walkdir::WalkDir;

use crate::error::{RarityError, Result};

/// Prefix for backup filenames.
const BACKUP_PREFIX: &str = "rarity_config_";

/// Extension for backup files.
const BACKUP_EXTENSION: &str = ".json";

/// Keeps timestamped copies of the rarity file.
#[derive(Debug, Clone)]
pub struct BackupRotation {
    backups_dir: PathBuf,

    /// Maximum number of backup files to retain; 0 disables backups.
    pub max_backups: usize,
}

impl BackupRotation {
    pub fn new(backups_dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            max_backups,
        }
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Copy `source` into the backups directory, then rotate.
    ///
    /// Returns the backup path, or `None` when backups are disabled or there
    /// is nothing to back up yet.
    pub fn backup(&self, source: &Path) -> Result<Option<PathBuf>> {
        if self.max_backups == 0 || !source.exists() {
            return Ok(None);
        }

        if !self.backups_dir.exists() {
            fs::create_dir_all(&self.backups_dir).map_err(|e| RarityError::DirectoryCreateError {
                path: self.backups_dir.clone(),
                source: e,
            })?;
        }

        // Format: rarity_config_YYYYMMDD_HHMMSS_mmm.json
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let filename = format!("{}{}{}", BACKUP_PREFIX, timestamp, BACKUP_EXTENSION);
        let backup_path = self.backups_dir.join(filename);

        fs::copy(source, &backup_path).map_err(|e| RarityError::FileWriteError {
            path: backup_path.clone(),
            source: e,
        })?;

        self.rotate()?;
        Ok(Some(backup_path))
    }

    /// Delete the oldest backups beyond `max_backups`.
    pub fn rotate(&self) -> Result<()> {
        let mut backups = Self::list_backups(&self.backups_dir)?;

        while backups.len() > self.max_backups {
            // Newest first, so the oldest sits at the end.
            if let Some(oldest) = backups.pop() {
                fs::remove_file(&oldest).map_err(|e| RarityError::FileWriteError {
                    path: oldest,
                    source: e,
                })?;
            }
        }

        Ok(())
    }

    /// All backup files in `backups_dir`, newest first.
    pub fn list_backups(backups_dir: &Path) -> Result<Vec<PathBuf>> {
        if !backups_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups: Vec<PathBuf> = WalkDir::new(backups_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy();
                name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_EXTENSION)
            })
            .map(|entry| entry.path().to_path_buf())
            .collect();

        // The timestamp in the name sorts lexicographically.
        backups.sort_by(|a, b| {
            let a_name = a.file_name().unwrap_or_default().to_string_lossy();
            let b_name = b.file_name().unwrap_or_default().to_string_lossy();
            b_name.cmp(&a_name)
        });

        Ok(backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_backups_nonexistent_dir() {
        let path = PathBuf::from("/nonexistent/path/that/does/not/exist");
        assert!(BackupRotation::list_backups(&path).unwrap().is_empty());
    }

    #[test]
    fn test_list_backups_filters_and_sorts() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("rarity_config_20240115_100000_000.json"), "{}").unwrap();
        fs::write(temp.path().join("rarity_config_20240115_120000_000.json"), "{}").unwrap();
        fs::write(temp.path().join("rarity_config_20240115_110000_000.json"), "{}").unwrap();
        fs::write(temp.path().join("sets.json"), "{}").unwrap();
        fs::write(temp.path().join("rarity_config_incomplete"), "{}").unwrap();

        let names: Vec<String> = BackupRotation::list_backups(temp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "rarity_config_20240115_120000_000.json",
                "rarity_config_20240115_110000_000.json",
                "rarity_config_20240115_100000_000.json",
            ]
        );
    }

    #[test]
    fn test_rotate_removes_oldest() {
        let temp = tempdir().unwrap();
        for i in 0..5 {
            fs::write(
                temp.path().join(format!("rarity_config_20240115_10000{}_000.json", i)),
                "{}",
            )
            .unwrap();
        }

        BackupRotation::new(temp.path(), 3).rotate().unwrap();

        let remaining = BackupRotation::list_backups(temp.path()).unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining[2]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("100002"));
    }

    #[test]
    fn test_backup_skips_missing_source_and_disabled_rotation() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("rarity_config.json");
        let rotation = BackupRotation::new(temp.path().join("backups"), 3);
        assert!(rotation.backup(&source).unwrap().is_none());

        fs::write(&source, "{}").unwrap();
        let disabled = BackupRotation::new(temp.path().join("backups"), 0);
        assert!(disabled.backup(&source).unwrap().is_none());

        let path = rotation.backup(&source).unwrap().unwrap();
        assert!(path.exists());
        assert!(path.starts_with(rotation.backups_dir()));
    }
}
