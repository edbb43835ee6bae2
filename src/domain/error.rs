// src/domain/error.rs
use crate::domain::bookmark::BookmarkBuilderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid bookmark: {0}")]
    InvalidBookmark(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error("Bookmark not found: {0}")]
    BookmarkNotFound(String),

    #[error("No match found: {0}")]
    NoMatch(String),

    #[error("Bookmark already exists: Id {id}: {url}")]
    BookmarkExists { id: i32, url: String },

    #[error("Bookmark does not exist: {0}")]
    BookmarkNotExists(String),

    #[error("Bookmark operation failed: {0}")]
    BookmarkOperationFailed(String),

    #[error("Repository error: {0}")]
    RepositoryError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl DomainError {
    /// Prefix the message with `context`, keeping the error kind.
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        let context = context.into();
        match self {
            DomainError::InvalidBookmark(msg) => {
                DomainError::InvalidBookmark(format!("{}: {}", context, msg))
            }
            DomainError::InvalidTag(msg) => DomainError::InvalidTag(format!("{}: {}", context, msg)),
            DomainError::BookmarkNotFound(msg) => {
                DomainError::BookmarkNotFound(format!("{}: {}", context, msg))
            }
            DomainError::NoMatch(msg) => DomainError::NoMatch(format!("{}: {}", context, msg)),
            DomainError::BookmarkNotExists(msg) => {
                DomainError::BookmarkNotExists(format!("{}: {}", context, msg))
            }
            DomainError::BookmarkOperationFailed(msg) => {
                DomainError::BookmarkOperationFailed(format!("{}: {}", context, msg))
            }
            DomainError::RepositoryError(msg) => {
                DomainError::RepositoryError(format!("{}: {}", context, msg))
            }
            DomainError::Other(msg) => DomainError::Other(format!("{}: {}", context, msg)),
            // structured variants keep their payload, the caller's context goes to the log
            err @ (DomainError::BookmarkExists { .. } | DomainError::Io(_)) => {
                tracing::debug!("{}: {}", context, err);
                err
            }
        }
    }

    /// Zero rows for an id/url lookup or a query.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::BookmarkNotFound(_) | DomainError::NoMatch(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<BookmarkBuilderError> for DomainError {
    fn from(e: BookmarkBuilderError) -> Self {
        DomainError::InvalidBookmark(e.to_string())
    }
}
