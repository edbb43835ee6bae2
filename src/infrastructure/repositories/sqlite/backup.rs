// src/infrastructure/repositories/sqlite/backup.rs
//
// Backups are plain file copies kept in a `backup/` directory next to the
// database, named `<YYYY-MM-DD_HH-MM>_<db name>`.

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use super::connection::{has_db_extension, SqliteConfig};
use super::error::{SqliteRepositoryError, SqliteResult};

pub const BACKUP_DIR: &str = "backup";
pub const BACKUP_DATE_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// `<now>_<db_name>`
pub fn backup_name(db_name: &str) -> String {
    format!("{}_{}", Local::now().format(BACKUP_DATE_FORMAT), db_name)
}

/// Copy `src` to `<dir of src>/backup/<dest_name>`.
///
/// An existing backup of that name is only overwritten with `force`.
#[instrument(level = "debug")]
pub fn create_backup(src: &Path, dest_name: &str, force: bool) -> SqliteResult<PathBuf> {
    let source_dir = src
        .parent()
        .filter(|p| p.as_os_str().is_empty() || p.exists())
        .ok_or_else(|| SqliteRepositoryError::BackupPathNotSet(src.to_path_buf()))?;

    let backup_dir = source_dir.join(BACKUP_DIR);
    fs::create_dir_all(&backup_dir)?;

    let dest = backup_dir.join(dest_name);
    if dest.exists() && !force {
        return Err(SqliteRepositoryError::BackupAlreadyExists(dest));
    }

    fs::copy(src, &dest)?;
    info!("backup created: {}", dest.display());
    Ok(dest)
}

/// Database files in `dir` (`.sqlite3`, `.sqlite`, `.db`), sorted by name.
pub fn list_databases(dir: &Path) -> SqliteResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_db_extension(&path) {
            found.push(path);
        }
    }
    found.sort();
    debug!("{} database(s) in {}", found.len(), dir.display());
    Ok(found)
}

/// Backups of one database with a rolling retention limit.
#[derive(Debug, Clone)]
pub struct BackupManager {
    db_path: PathBuf,
    dir: PathBuf,
    limit: usize,
}

impl BackupManager {
    pub fn new<P: Into<PathBuf>>(db_path: P) -> Self {
        let db_path = db_path.into();
        let dir = db_path
            .parent()
            .map(|p| p.join(BACKUP_DIR))
            .unwrap_or_else(|| PathBuf::from(BACKUP_DIR));
        Self {
            db_path,
            dir,
            limit: 0,
        }
    }

    pub fn from_config(cfg: &SqliteConfig) -> Self {
        let mut manager = Self::new(cfg.fullpath());
        manager.set_retention_limit(cfg.backup_limit);
        manager
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of backups to keep; 0 disables backups.
    pub fn set_retention_limit(&mut self, n: usize) {
        self.limit = n;
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    fn db_file_name(&self) -> String {
        self.db_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Back up the managed database under a timestamped name.
    pub fn create(&self, force: bool) -> SqliteResult<PathBuf> {
        if !self.is_enabled() {
            return Err(SqliteRepositoryError::BackupDisabled);
        }
        create_backup(&self.db_path, &backup_name(&self.db_file_name()), force)
    }

    /// Backups of this database, oldest first.
    pub fn list_backups(&self) -> SqliteResult<Vec<PathBuf>> {
        let name = self.db_file_name();
        let backups: Vec<PathBuf> = if self.dir.is_dir() {
            list_databases(&self.dir)?
                .into_iter()
                .filter(|p| {
                    p.file_name()
                        .map(|f| f.to_string_lossy().contains(&name))
                        .unwrap_or(false)
                })
                .collect()
        } else {
            Vec::new()
        };

        if backups.is_empty() {
            return Err(SqliteRepositoryError::BackupNotFound(name));
        }
        Ok(backups)
    }

    /// Delete the oldest backups beyond the retention limit.
    ///
    /// Returns the removed paths.
    #[instrument(skip(self), level = "debug")]
    pub fn purge_expired(&self) -> SqliteResult<Vec<PathBuf>> {
        if !self.is_enabled() {
            return Err(SqliteRepositoryError::BackupDisabled);
        }

        let backups = match self.list_backups() {
            Ok(b) => b,
            Err(SqliteRepositoryError::BackupNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        if backups.len() <= self.limit {
            return Ok(Vec::new());
        }

        let excess = backups.len() - self.limit;
        let expired: Vec<PathBuf> = backups.into_iter().take(excess).collect();
        for path in &expired {
            fs::remove_file(path)?;
            debug!("removed expired backup: {}", path.display());
        }
        info!("purged {} expired backup(s)", expired.len());
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn given_name_when_backup_name_then_date_prefixed() {
        let name = backup_name("bookmarks.db");
        let (prefix, rest) = name.split_at(16);
        assert_eq!(rest, "_bookmarks.db");
        assert!(chrono::NaiveDateTime::parse_from_str(prefix, BACKUP_DATE_FORMAT).is_ok());
    }

    #[test]
    fn given_db_path_when_new_manager_then_sibling_backup_dir() {
        let manager = BackupManager::new("/data/marks/bookmarks.db");
        assert_eq!(manager.dir(), Path::new("/data/marks/backup"));
        assert!(!manager.is_enabled());
    }

    #[test]
    fn given_missing_source_dir_when_create_backup_then_path_not_set() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("nope").join("x.db");
        assert!(matches!(
            create_backup(&src, "b_x.db", false),
            Err(SqliteRepositoryError::BackupPathNotSet(_))
        ));
    }

    #[test]
    fn given_mixed_files_when_list_databases_then_only_db_extensions() {
        let dir = tempdir().unwrap();
        for name in ["a.db", "b.sqlite", "c.sqlite3", "notes.txt", "d.db-journal"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let names: Vec<String> = list_databases(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.db", "b.sqlite", "c.sqlite3"]);
    }
}
