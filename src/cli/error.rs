// src/cli/error.rs
use crate::domain::error::DomainError;
use crate::exitcode;
use crate::infrastructure::repositories::sqlite::error::SqliteRepositoryError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid ID format: {0}")]
    InvalidIdFormat(String),

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Repository(#[from] SqliteRepositoryError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        match self {
            CliError::InvalidInput(msg) => {
                CliError::InvalidInput(format!("{}: {}", context.into(), msg))
            }
            CliError::Domain(err) => CliError::Domain(err.context(context)),
            CliError::Other(msg) => CliError::Other(format!("{}: {}", context.into(), msg)),
            err => CliError::Other(format!("{}: {}", context.into(), err)),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidInput(_) | CliError::InvalidIdFormat(_) => exitcode::USAGE,
            CliError::Io(_) => exitcode::IOERR,
            CliError::Domain(err) => match err {
                DomainError::BookmarkExists { .. } => exitcode::DUP,
                DomainError::InvalidBookmark(_) | DomainError::InvalidTag(_) => exitcode::USAGE,
                e if e.is_not_found() => exitcode::NOINPUT,
                DomainError::BookmarkNotExists(_) => exitcode::NOINPUT,
                DomainError::Io(_) => exitcode::IOERR,
                _ => exitcode::SOFTWARE,
            },
            CliError::Repository(err) => match err {
                SqliteRepositoryError::ConnectionError(_)
                | SqliteRepositoryError::ConnectionClosed => exitcode::UNAVAILABLE,
                SqliteRepositoryError::Duplicate { .. }
                | SqliteRepositoryError::BackupAlreadyExists(_) => exitcode::DUP,
                SqliteRepositoryError::Invalid(_)
                | SqliteRepositoryError::InvalidTableName(_)
                | SqliteRepositoryError::TagsBound { .. }
                | SqliteRepositoryError::BackupDisabled => exitcode::USAGE,
                e if e.is_not_found() => exitcode::NOINPUT,
                SqliteRepositoryError::NotExists { .. }
                | SqliteRepositoryError::NotInitialized(_)
                | SqliteRepositoryError::Empty(_)
                | SqliteRepositoryError::BackupNotFound(_) => exitcode::NOINPUT,
                SqliteRepositoryError::IoError(_) | SqliteRepositoryError::BackupPathNotSet(_) => {
                    exitcode::IOERR
                }
                _ => exitcode::SOFTWARE,
            },
            CliError::Other(_) => exitcode::SOFTWARE,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_duplicate_when_exit_code_then_dup() {
        let err = CliError::from(DomainError::BookmarkExists {
            id: 1,
            url: "https://a.com".to_string(),
        });
        assert_eq!(err.exit_code(), exitcode::DUP);
    }

    #[test]
    fn given_connection_failure_when_exit_code_then_unavailable() {
        let err = CliError::from(SqliteRepositoryError::ConnectionClosed);
        assert_eq!(err.exit_code(), exitcode::UNAVAILABLE);
    }

    #[test]
    fn given_context_when_domain_error_then_kind_kept() {
        let err = CliError::from(DomainError::BookmarkNotFound("id 3".to_string()))
            .context("show");
        assert!(matches!(err, CliError::Domain(DomainError::BookmarkNotFound(_))));
        assert_eq!(err.exit_code(), exitcode::NOINPUT);
    }
}
