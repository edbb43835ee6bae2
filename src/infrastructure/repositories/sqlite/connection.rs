// src/infrastructure/repositories/sqlite/connection.rs

use super::error::{SqliteRepositoryError, SqliteResult};
use super::schema::Tables;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sqlite::SqliteConnection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub const DEFAULT_DB_NAME: &str = "bookmarks.db";
pub const DEFAULT_MAX_BYTES_SIZE: u64 = 1_000_000;
pub const DEFAULT_BACKUP_LIMIT: usize = 3;
/// File extensions recognised as databases.
pub const DB_EXTENSIONS: [&str; 3] = ["sqlite3", "sqlite", "db"];

/// Everything needed to open one bookmark collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// File name, always carrying a database extension
    pub name: String,
    /// Directory holding the database file
    pub path: PathBuf,
    pub tables: Tables,
    /// Vacuum threshold checked on open
    pub max_bytes_size: u64,
    /// Number of backups kept, 0 disables backups
    pub backup_limit: usize,
}

impl SqliteConfig {
    pub fn new<P: Into<PathBuf>>(path: P, name: &str) -> Self {
        Self {
            name: ensure_db_extension(name),
            path: path.into(),
            tables: Tables::default(),
            max_bytes_size: DEFAULT_MAX_BYTES_SIZE,
            backup_limit: DEFAULT_BACKUP_LIMIT,
        }
    }

    pub fn with_tables(mut self, tables: Tables) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_max_bytes_size(mut self, size: u64) -> Self {
        self.max_bytes_size = size;
        self
    }

    pub fn with_backup_limit(mut self, limit: usize) -> Self {
        self.backup_limit = limit;
        self
    }

    /// Full path of the database file.
    pub fn fullpath(&self) -> PathBuf {
        self.path.join(&self.name)
    }
}

/// Append `.db` unless the name already ends in a database extension.
pub fn ensure_db_extension(name: &str) -> String {
    let name = name.trim();
    let name = if name.is_empty() { DEFAULT_DB_NAME } else { name };
    if has_db_extension(Path::new(name)) {
        name.to_string()
    } else {
        format!("{}.db", name)
    }
}

pub fn has_db_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DB_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Open the database file, creating it and its directory when missing.
///
/// Foreign keys are switched on for the connection and it is pinged once, so
/// a returned connection is known to be usable.
#[instrument(level = "debug")]
pub fn establish(db_path: &Path) -> SqliteResult<SqliteConnection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(SqliteRepositoryError::IoError)?;
            debug!("created database directory: {}", parent.display());
        }
    }

    let url = db_path.to_string_lossy();
    let mut conn = SqliteConnection::establish(&url)?;
    conn.batch_execute("PRAGMA foreign_keys = ON;")?;
    ping(&mut conn)?;

    info!("connected to {}", db_path.display());
    Ok(conn)
}

/// Round trip a trivial query.
pub fn ping(conn: &mut SqliteConnection) -> SqliteResult<()> {
    sql_query("SELECT 1").execute(conn).map_err(|e| {
        SqliteRepositoryError::ConnectionError(diesel::ConnectionError::BadConnection(format!(
            "ping failed: {}",
            e
        )))
    })?;
    Ok(())
}
