// src/infrastructure/repositories/sqlite/error.rs

use crate::domain::error::DomainError;
use diesel::result::Error as DieselError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqliteRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DieselError),

    #[error("Diesel connection error: {0}")]
    ConnectionError(#[from] diesel::ConnectionError),

    #[error("Database connection already closed")]
    ConnectionClosed,

    #[error("No record found in '{table}': {key}")]
    NotFound { table: String, key: String },

    #[error("No match found in '{table}': '{query}'")]
    NoMatch { table: String, query: String },

    #[error("Record already exists in '{table}' with id {id}: {url}")]
    Duplicate { table: String, url: String, id: i32 },

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Record does not exist in '{table}': {key}")]
    NotExists { table: String, key: String },

    #[error("Database not initialized: table '{0}' missing")]
    NotInitialized(String),

    #[error("Database is empty: {0}")]
    Empty(String),

    #[error("Invalid table name: '{0}'")]
    InvalidTableName(String),

    #[error("Cannot use '{table}' as main table: tags are bound to '{bound}'")]
    TagsBound { table: String, bound: String },

    #[error("Maintenance failed at {step} on '{table}': {source}")]
    MaintenanceFailed {
        step: &'static str,
        table: String,
        #[source]
        source: DieselError,
    },

    #[error("Backup already exists: {0}")]
    BackupAlreadyExists(PathBuf),

    #[error("No backup found: {0}")]
    BackupNotFound(String),

    #[error("Backups are disabled")]
    BackupDisabled,

    #[error("Backup path not set: {0}")]
    BackupPathNotSet(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Repository operation failed: {0}")]
    OperationFailed(String),
}

pub type SqliteResult<T> = Result<T, SqliteRepositoryError>;

impl SqliteRepositoryError {
    /// Wrap a diesel error raised by one step of a maintenance protocol.
    pub fn maintenance(step: &'static str, table: impl Into<String>) -> impl FnOnce(DieselError) -> Self {
        let table = table.into();
        move |source| SqliteRepositoryError::MaintenanceFailed {
            step,
            table,
            source,
        }
    }

    /// Attribute a database error to a maintenance step, other kinds pass through.
    pub fn in_step(self, step: &'static str, table: impl Into<String>) -> Self {
        match self {
            SqliteRepositoryError::DatabaseError(source) => SqliteRepositoryError::MaintenanceFailed {
                step,
                table: table.into(),
                source,
            },
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SqliteRepositoryError::NotFound { .. } | SqliteRepositoryError::NoMatch { .. }
        )
    }
}

impl From<SqliteRepositoryError> for DomainError {
    fn from(err: SqliteRepositoryError) -> Self {
        match err {
            SqliteRepositoryError::NotFound { table, key } => {
                DomainError::BookmarkNotFound(format!("{} (table: {})", key, table))
            }
            SqliteRepositoryError::NoMatch { table, query } => {
                DomainError::NoMatch(format!("'{}' (table: {})", query, table))
            }
            SqliteRepositoryError::Duplicate { url, id, .. } => {
                DomainError::BookmarkExists { id, url }
            }
            SqliteRepositoryError::Invalid(msg) => DomainError::InvalidBookmark(msg),
            SqliteRepositoryError::NotExists { table, key } => {
                DomainError::BookmarkNotExists(format!("{} (table: {})", key, table))
            }
            SqliteRepositoryError::DatabaseError(diesel_err) => match diesel_err {
                DieselError::NotFound => {
                    DomainError::BookmarkNotFound("Resource not found".to_string())
                }
                DieselError::DatabaseError(_, info) => DomainError::BookmarkOperationFailed(
                    format!("Database error: {}", info.message()),
                ),
                _ => DomainError::BookmarkOperationFailed(format!(
                    "Database error: {}",
                    diesel_err
                )),
            },
            SqliteRepositoryError::IoError(e) => DomainError::Io(e),
            other => DomainError::RepositoryError(other.to_string()),
        }
    }
}

impl From<DomainError> for SqliteRepositoryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidBookmark(msg) | DomainError::InvalidTag(msg) => {
                SqliteRepositoryError::Invalid(msg)
            }
            other => SqliteRepositoryError::OperationFailed(other.to_string()),
        }
    }
}
