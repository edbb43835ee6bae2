// src/domain/repositories/repository.rs

use crate::domain::bookmark::Bookmark;
use crate::domain::error::DomainResult;
use crate::infrastructure::repositories::sqlite::schema::Table;
/*
   Repository Interface
   Record operations are table-parametric: the same schema backs the live
   ("main") table and the soft-deleted table, so every call names its table.

   Read paths report zero rows as `BookmarkNotFound` (id/url lookups) or
   `NoMatch` (queries); callers decide whether that is an error.
*/
/// Repository trait for bookmark persistence operations
pub trait BookmarkRepository: std::fmt::Debug + Send + Sync {
    /// Insert a new bookmark, returning it with generated id and timestamps
    fn insert(&self, table: &Table, bookmark: &Bookmark) -> DomainResult<Bookmark>;

    /// Insert many bookmarks in one transaction, all or nothing
    fn insert_bulk(&self, table: &Table, bookmarks: &[Bookmark]) -> DomainResult<()>;

    /// Overwrite the mutable fields of an existing bookmark, tag associations untouched
    fn update(&self, table: &Table, bookmark: &Bookmark) -> DomainResult<Bookmark>;

    /// Like `update`, but also syncs the tag associations to the bookmark's tags
    fn update_with_tags(&self, table: &Table, bookmark: &Bookmark) -> DomainResult<Bookmark>;

    /// Delete a bookmark by ID
    fn delete(&self, table: &Table, id: i32) -> DomainResult<()>;

    /// Delete many bookmarks in one transaction, returns the number removed
    fn delete_bulk(&self, table: &Table, ids: &[i32]) -> DomainResult<usize>;

    /// Get a bookmark by its ID
    fn by_id(&self, table: &Table, id: i32) -> DomainResult<Bookmark>;

    /// Get a bookmark by its URL
    fn by_url(&self, table: &Table, url: &str) -> DomainResult<Bookmark>;

    /// Substring search over id, url, title, description and tags
    fn by_query(&self, table: &Table, query: &str) -> DomainResult<Vec<Bookmark>>;

    /// Bookmarks carrying the exact tag
    fn by_tag(&self, table: &Table, tag: &str) -> DomainResult<Vec<Bookmark>>;

    /// Get all bookmarks ordered by id
    fn all(&self, table: &Table) -> DomainResult<Vec<Bookmark>>;

    /// Increment the visit counter and stamp `last_visit`
    fn record_visit(&self, table: &Table, id: i32) -> DomainResult<Bookmark>;

    /// Flip the favorite flag
    fn toggle_favorite(&self, table: &Table, id: i32) -> DomainResult<Bookmark>;

    fn count(&self, table: &Table) -> DomainResult<usize>;

    /// Highest id in the table, 0 when empty
    fn max_id(&self, table: &Table) -> DomainResult<i32>;

    /// True when both tables hold no rows
    fn is_empty(&self, main: &Table, deleted: &Table) -> DomainResult<bool>;
}
