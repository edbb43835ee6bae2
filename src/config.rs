// src/config.rs
use crate::domain::error::{DomainError, DomainResult};
use crate::infrastructure::repositories::sqlite::connection::{
    SqliteConfig, DEFAULT_BACKUP_LIMIT, DEFAULT_DB_NAME, DEFAULT_MAX_BYTES_SIZE,
};
use crate::infrastructure::repositories::sqlite::schema::{
    Table, Tables, DEFAULT_DELETED_TABLE, DEFAULT_MAIN_TABLE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, trace, warn};

pub const ENV_HOME: &str = "MARKS_HOME";
pub const ENV_DB_NAME: &str = "MARKS_DB_NAME";
pub const ENV_BACKUP_MAX: &str = "MARKS_BACKUP_MAX";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Directory holding the databases and their `backup/` directory
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database file name, `.db` is appended when no extension is given
    #[serde(default = "default_db_name")]
    pub db_name: String,

    #[serde(default = "default_main_table")]
    pub main_table: String,

    #[serde(default = "default_deleted_table")]
    pub deleted_table: String,

    /// The database is vacuumed on open once it grows past this many bytes
    #[serde(default = "default_max_bytes_size")]
    pub max_bytes_size: u64,

    /// Backups to keep (0 disables backups)
    #[serde(default = "default_backup_limit")]
    pub backup_limit: usize,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("marks")
        .to_string_lossy()
        .into_owned()
}

fn default_db_name() -> String {
    DEFAULT_DB_NAME.to_string()
}

fn default_main_table() -> String {
    DEFAULT_MAIN_TABLE.to_string()
}

fn default_deleted_table() -> String {
    DEFAULT_DELETED_TABLE.to_string()
}

fn default_max_bytes_size() -> u64 {
    DEFAULT_MAX_BYTES_SIZE
}

fn default_backup_limit() -> usize {
    DEFAULT_BACKUP_LIMIT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_name: default_db_name(),
            main_table: default_main_table(),
            deleted_table: default_deleted_table(),
            max_bytes_size: default_max_bytes_size(),
            backup_limit: default_backup_limit(),
        }
    }
}

impl Settings {
    /// Data directory with `~` and environment variables expanded.
    pub fn data_path(&self) -> PathBuf {
        match shellexpand::full(&self.data_dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                warn!("cannot expand '{}': {}", self.data_dir, e);
                PathBuf::from(&self.data_dir)
            }
        }
    }

    /// Repository configuration for the configured database.
    pub fn sqlite_config(&self) -> DomainResult<SqliteConfig> {
        let tables = Tables {
            main: Table::new(self.main_table.as_str())?,
            deleted: Table::new(self.deleted_table.as_str())?,
        };
        Ok(SqliteConfig::new(self.data_path(), &self.db_name)
            .with_tables(tables)
            .with_max_bytes_size(self.max_bytes_size)
            .with_backup_limit(self.backup_limit))
    }
}

/// `~/.config/marks/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".config/marks/config.toml"))
}

fn read_config_file(path: &Path) -> DomainResult<Settings> {
    let text = std::fs::read_to_string(path)?;
    toml::from_str::<Settings>(&text)
        .map_err(|e| DomainError::Other(format!("invalid config {}: {}", path.display(), e)))
}

/// Defaults, then the config file, then `MARKS_*` environment variables.
///
/// An explicitly given config file must load; a broken file at the default
/// location is skipped with a warning.
#[instrument(level = "debug")]
pub fn load_settings(config_file: Option<&Path>) -> DomainResult<Settings> {
    trace!("Loading settings");

    let mut settings = match config_file {
        Some(path) => read_config_file(path)?,
        None => match default_config_file().filter(|p| p.exists()) {
            Some(path) => read_config_file(&path).unwrap_or_else(|e| {
                warn!("ignoring config file: {}", e);
                Settings::default()
            }),
            None => Settings::default(),
        },
    };

    if let Ok(home) = std::env::var(ENV_HOME) {
        trace!("Using {} from environment: {}", ENV_HOME, home);
        settings.data_dir = home;
    }

    if let Ok(name) = std::env::var(ENV_DB_NAME) {
        trace!("Using {} from environment: {}", ENV_DB_NAME, name);
        settings.db_name = name;
    }

    if let Ok(limit) = std::env::var(ENV_BACKUP_MAX) {
        match limit.trim().parse::<usize>() {
            Ok(n) => settings.backup_limit = n,
            Err(_) => warn!("{} is not a number: '{}'", ENV_BACKUP_MAX, limit),
        }
    }

    debug!("Settings loaded: {:?}", settings);
    Ok(settings)
}

pub fn generate_default_config() -> String {
    let default_settings = Settings::default();
    toml::to_string_pretty(&default_settings)
        .unwrap_or_else(|_| "# Error generating default configuration".to_string())
}
