// src/infrastructure/repositories/sqlite/repository.rs

use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Bool, Integer, Text, Timestamp};
use diesel::QueryableByName;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::connection::{establish, SqliteConfig};
use super::error::{SqliteRepositoryError, SqliteResult};
use super::maintenance;
use super::model::{CountResult, DbBookmark, IdResult};
use super::schema::{
    bind_tag_tables, create_table, init_schema, Table, Tables, RELATION_TABLE, TAGS_TABLE,
};
use super::tags;
use crate::domain::bookmark::{normalize_url, Bookmark};
use crate::domain::error::DomainResult;
use crate::domain::repositories::repository::BookmarkRepository;

const COLUMNS: &str =
    r#"id, url, title, tags, "desc", created_at, last_visit, updated_at, visit_count, favorite"#;

/// Columns `has_record` may search.
const SEARCHABLE_COLUMNS: [&str; 3] = ["id", "url", "title"];

#[derive(QueryableByName, Debug)]
struct Association {
    #[diesel(sql_type = Text)]
    url: String,
    #[diesel(sql_type = Text)]
    tag: String,
}

/// Handle on one bookmark database.
///
/// Owns a single connection. `close` takes it out exactly once; any
/// operation afterwards fails with `ConnectionClosed`.
pub struct SqliteRepository {
    conn: Mutex<Option<SqliteConnection>>,
    cfg: SqliteConfig,
    tables: Tables,
}

impl SqliteRepository {
    /// Open (or create) the database described by `cfg`.
    ///
    /// Creates the schema, finishes a reorder that was interrupted mid-swap
    /// and vacuums when the file outgrew `cfg.max_bytes_size`.
    #[instrument(skip_all, level = "debug")]
    pub fn open(cfg: SqliteConfig) -> SqliteResult<Self> {
        let path = cfg.fullpath();
        let mut conn = establish(&path)?;

        maintenance::recover_interrupted_reorder(&mut conn, &cfg.tables.main)?;
        maintenance::recover_interrupted_reorder(&mut conn, &cfg.tables.deleted)?;
        init_schema(&mut conn, &cfg.tables)?;
        maintenance::check_size(&mut conn, cfg.max_bytes_size)?;

        info!("opened repository: {}", path.display());
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            tables: cfg.tables.clone(),
            cfg,
        })
    }

    /// Release the connection. Later calls are no-ops.
    pub fn close(&self) {
        let taken = match self.conn.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if taken.is_some() {
            debug!("closed database: {}", self.cfg.name);
        }
    }

    pub fn is_closed(&self) -> bool {
        match self.conn.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.cfg
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn db_path(&self) -> PathBuf {
        self.cfg.fullpath()
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Make `table` the live table, creating it when missing.
    ///
    /// The tag junction and its cleanup trigger follow the new table. That
    /// fails with `TagsBound` while associations of the old table remain.
    #[instrument(skip(self), level = "debug")]
    pub fn set_main(&mut self, table: Table) -> SqliteResult<()> {
        self.with_tx(|conn| {
            create_table(conn, &table)?;
            bind_tag_tables(conn, &table)
        })?;
        self.tables.main = table;
        Ok(())
    }

    /// Make `table` the soft-delete table, creating it when missing.
    #[instrument(skip(self), level = "debug")]
    pub fn set_deleted(&mut self, table: Table) -> SqliteResult<()> {
        self.with_conn(|conn| create_table(conn, &table))?;
        self.tables.deleted = table;
        Ok(())
    }

    /// `"<name> (main: N, deleted: M)"`
    pub fn summary(&self) -> SqliteResult<String> {
        let main = self.with_conn(|conn| count_rows(conn, &self.tables.main))?;
        let deleted = self.with_conn(|conn| count_rows(conn, &self.tables.deleted))?;
        Ok(format!("{} (main: {}, deleted: {})", self.cfg.name, main, deleted))
    }

    /// Run `f` on the open connection.
    pub(crate) fn with_conn<T, F>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> SqliteResult<T>,
    {
        let mut guard = self.conn.lock().map_err(|_| {
            SqliteRepositoryError::OperationFailed("connection lock poisoned".to_string())
        })?;
        let conn = guard.as_mut().ok_or(SqliteRepositoryError::ConnectionClosed)?;
        f(conn)
    }

    /// Run `f` inside one transaction, rolled back on error.
    pub(crate) fn with_tx<T, F>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> SqliteResult<T>,
    {
        self.with_conn(|conn| conn.transaction::<T, SqliteRepositoryError, _>(f))
    }

    fn is_main(&self, table: &Table) -> bool {
        table == &self.tables.main
    }

    /// Existence check on `id`, `url` or `title`.
    #[instrument(skip(self), level = "debug")]
    pub fn has_record(&self, table: &Table, column: &str, value: &str) -> SqliteResult<bool> {
        if !SEARCHABLE_COLUMNS.contains(&column) {
            return Err(SqliteRepositoryError::Invalid(format!(
                "column '{}' cannot be searched",
                column
            )));
        }
        self.with_conn(|conn| {
            let result: CountResult = sql_query(format!(
                "SELECT COUNT(*) AS count FROM {} WHERE {} = ?",
                table, column
            ))
            .bind::<Text, _>(value)
            .get_result(conn)?;
            Ok(result.count > 0)
        })
    }

    /// Usage count per tag, unused tags included.
    pub fn counter_tags(&self) -> SqliteResult<BTreeMap<String, usize>> {
        self.with_conn(tags::counter_tags)
    }

    /// Add tags to a live bookmark.
    pub fn associate_tags(&self, url: &str, tags_csv: &str) -> SqliteResult<usize> {
        let url = normalize_url(url);
        self.with_tx(|conn| {
            if find_id_by_url(conn, &self.tables.main, &url)?.is_none() {
                return Err(not_exists(&self.tables.main, &url));
            }
            tags::associate_tags(conn, &url, tags_csv)
        })
    }

    /// Remove tags from a live bookmark; one left without tags is deleted.
    pub fn dissociate_tags(&self, url: &str, tags_csv: &str) -> SqliteResult<usize> {
        let url = normalize_url(url);
        self.with_tx(|conn| tags::dissociate_tags(conn, &self.tables.main, &url, tags_csv))
    }

    /// Soft delete: move rows from main into deleted, then renumber main.
    ///
    /// A deleted row with the same url is replaced. Ids missing from main
    /// are skipped, but at least one must match.
    #[instrument(skip(self), level = "debug")]
    pub fn move_to_deleted(&self, ids: &[i32]) -> SqliteResult<usize> {
        let Tables { main, deleted } = self.tables.clone();

        let moved = self.with_tx(|conn| {
            let mut moved = 0;
            for &id in ids {
                let bookmark = match fetch_by_id(conn, &main, id, true) {
                    Ok(b) => b,
                    Err(e) if e.is_not_found() => {
                        warn!("id {} not in {}, skipped", id, main);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                sql_query(format!("DELETE FROM {} WHERE id = ?", main))
                    .bind::<Integer, _>(id)
                    .execute(conn)?;
                sql_query(format!("DELETE FROM {} WHERE url = ?", deleted))
                    .bind::<Text, _>(bookmark.url.as_str())
                    .execute(conn)?;
                insert_row(conn, &deleted, &bookmark)?;
                moved += 1;
            }
            if moved == 0 {
                return Err(not_found(&main, &format!("ids {:?}", ids)));
            }
            tags::prune_orphans(conn)?;
            reset_sequence_if_empty(conn, &main)?;
            Ok(moved)
        })?;

        self.reorder_ids(&main)?;
        debug!("moved {} bookmark(s) to {}", moved, deleted);
        Ok(moved)
    }

    /// Insert bookmarks into main, re-associating their tags. All or nothing.
    pub fn restore(&self, bookmarks: &[Bookmark]) -> SqliteResult<()> {
        let main = self.tables.main.clone();
        self.with_tx(|conn| {
            for bookmark in bookmarks {
                insert_one(conn, &main, &prepare(bookmark)?, true)?;
            }
            Ok(())
        })
    }

    /// Move rows back from deleted into main, then renumber deleted.
    #[instrument(skip(self), level = "debug")]
    pub fn restore_from_deleted(&self, ids: &[i32]) -> SqliteResult<usize> {
        let Tables { main, deleted } = self.tables.clone();

        let restored = self.with_tx(|conn| {
            let mut restored = 0;
            for &id in ids {
                let bookmark = match fetch_by_id(conn, &deleted, id, false) {
                    Ok(b) => b,
                    Err(e) if e.is_not_found() => {
                        warn!("id {} not in {}, skipped", id, deleted);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                insert_one(conn, &main, &bookmark, true)?;
                sql_query(format!("DELETE FROM {} WHERE id = ?", deleted))
                    .bind::<Integer, _>(id)
                    .execute(conn)?;
                restored += 1;
            }
            if restored == 0 {
                return Err(not_found(&deleted, &format!("ids {:?}", ids)));
            }
            reset_sequence_if_empty(conn, &deleted)?;
            Ok(restored)
        })?;

        self.reorder_ids(&deleted)?;
        Ok(restored)
    }
}

impl fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRepository")
            .field("path", &self.cfg.fullpath())
            .field("tables", &self.tables)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for SqliteRepository {
    fn drop(&mut self) {
        self.close();
    }
}

fn not_found(table: &Table, key: &str) -> SqliteRepositoryError {
    SqliteRepositoryError::NotFound {
        table: table.to_string(),
        key: key.to_string(),
    }
}

fn not_exists(table: &Table, key: &str) -> SqliteRepositoryError {
    SqliteRepositoryError::NotExists {
        table: table.to_string(),
        key: key.to_string(),
    }
}

fn no_match(table: &Table, query: &str) -> SqliteRepositoryError {
    SqliteRepositoryError::NoMatch {
        table: table.to_string(),
        query: query.to_string(),
    }
}

/// `%query%` with `\`, `%` and `_` taken literally under `ESCAPE '\'`.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn select_sql(table: &Table, filter: &str) -> String {
    format!("SELECT {COLUMNS} FROM {table} {filter} ORDER BY id ASC")
}

/// Validated copy with the url in stored form.
fn prepare(bookmark: &Bookmark) -> SqliteResult<Bookmark> {
    let mut bookmark = bookmark.clone();
    bookmark.url = normalize_url(&bookmark.url);
    if !bookmark.is_valid() {
        return Err(SqliteRepositoryError::Invalid(
            "URL cannot be empty".to_string(),
        ));
    }
    Ok(bookmark)
}

fn associations(conn: &mut SqliteConnection) -> SqliteResult<HashMap<String, Vec<String>>> {
    let rows: Vec<Association> = sql_query(format!(
        "SELECT bt.bookmark_url AS url, t.name AS tag FROM {RELATION_TABLE} bt \
         JOIN {TAGS_TABLE} t ON t.id = bt.tag_id ORDER BY bt.rowid"
    ))
    .load(conn)?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        map.entry(row.url).or_default().push(row.tag);
    }
    Ok(map)
}

/// Convert rows to bookmarks; with `derive_tags` the tags come from the junction.
pub(super) fn hydrate(
    conn: &mut SqliteConnection,
    mut rows: Vec<DbBookmark>,
    derive_tags: bool,
) -> SqliteResult<Vec<Bookmark>> {
    if derive_tags && !rows.is_empty() {
        let assoc = if let [row] = rows.as_slice() {
            HashMap::from([(row.url.clone(), tags::tags_for(conn, &row.url)?)])
        } else {
            associations(conn)?
        };
        for row in rows.iter_mut() {
            if let Some(names) = assoc.get(&row.url).filter(|n| !n.is_empty()) {
                row.tags = format!("{},", names.join(","));
            }
        }
    }

    rows.into_iter()
        .map(|row| row.into_domain().map_err(SqliteRepositoryError::from))
        .collect()
}

/// All rows in id order, tags column as stored.
pub(super) fn load_raw(conn: &mut SqliteConnection, table: &Table) -> SqliteResult<Vec<DbBookmark>> {
    Ok(sql_query(select_sql(table, "")).load(conn)?)
}

fn fetch_by_id(
    conn: &mut SqliteConnection,
    table: &Table,
    id: i32,
    derive_tags: bool,
) -> SqliteResult<Bookmark> {
    let rows: Vec<DbBookmark> = sql_query(select_sql(table, "WHERE id = ?"))
        .bind::<Integer, _>(id)
        .load(conn)?;
    hydrate(conn, rows, derive_tags)?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(table, &format!("id {}", id)))
}

fn find_id_by_url(conn: &mut SqliteConnection, table: &Table, url: &str) -> SqliteResult<Option<i32>> {
    let found = sql_query(format!("SELECT id FROM {} WHERE url = ?", table))
        .bind::<Text, _>(url)
        .get_result::<IdResult>(conn)
        .optional()?;
    Ok(found.map(|r| r.id))
}

fn id_exists(conn: &mut SqliteConnection, table: &Table, id: i32) -> SqliteResult<bool> {
    let found = sql_query(format!("SELECT id FROM {} WHERE id = ?", table))
        .bind::<Integer, _>(id)
        .get_result::<IdResult>(conn)
        .optional()?;
    Ok(found.is_some())
}

/// Plain insert keeping the bookmark's timestamps, returns the new id.
pub(super) fn insert_row(conn: &mut SqliteConnection, table: &Table, b: &Bookmark) -> SqliteResult<i32> {
    sql_query(format!(
        r#"INSERT INTO {table} (url, title, tags, "desc", created_at, last_visit, updated_at, visit_count, favorite)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#
    ))
    .bind::<Text, _>(b.url.as_str())
    .bind::<Text, _>(b.title.as_str())
    .bind::<Text, _>(b.formatted_tags())
    .bind::<Text, _>(b.description.as_str())
    .bind::<Timestamp, _>(b.created_at.naive_utc())
    .bind::<Timestamp, _>(b.last_visit.naive_utc())
    .bind::<Timestamp, _>(b.updated_at.naive_utc())
    .bind::<Integer, _>(b.visit_count)
    .bind::<Bool, _>(b.favorite)
    .execute(conn)?;

    let id = sql_query("SELECT last_insert_rowid() AS id").get_result::<IdResult>(conn)?;
    Ok(id.id)
}

/// Duplicate check, insert and (for the live table) tag association.
fn insert_one(
    conn: &mut SqliteConnection,
    table: &Table,
    b: &Bookmark,
    associate: bool,
) -> SqliteResult<i32> {
    if let Some(id) = find_id_by_url(conn, table, &b.url)? {
        return Err(SqliteRepositoryError::Duplicate {
            table: table.to_string(),
            url: b.url.clone(),
            id,
        });
    }
    let id = insert_row(conn, table, b)?;
    if associate {
        tags::associate_tags(conn, &b.url, &b.formatted_tags())?;
    }
    debug!("inserted into {} with id {}: {}", table, id, b.url);
    Ok(id)
}

/// Overwrite the editable fields, returns the id of the updated row.
fn update_row(conn: &mut SqliteConnection, table: &Table, b: &Bookmark) -> SqliteResult<i32> {
    let id = match b.id {
        Some(id) => {
            if !id_exists(conn, table, id)? {
                return Err(not_exists(table, &format!("id {}", id)));
            }
            id
        }
        None => find_id_by_url(conn, table, &b.url)?.ok_or_else(|| not_exists(table, &b.url))?,
    };

    if let Some(other) = find_id_by_url(conn, table, &b.url)? {
        if other != id {
            return Err(SqliteRepositoryError::Duplicate {
                table: table.to_string(),
                url: b.url.clone(),
                id: other,
            });
        }
    }

    sql_query(format!(
        r#"UPDATE {table} SET url = ?, title = ?, tags = ?, "desc" = ?, updated_at = ?,
           last_visit = ?, visit_count = ?, favorite = ? WHERE id = ?"#
    ))
    .bind::<Text, _>(b.url.as_str())
    .bind::<Text, _>(b.title.as_str())
    .bind::<Text, _>(b.formatted_tags())
    .bind::<Text, _>(b.description.as_str())
    .bind::<Timestamp, _>(Utc::now().naive_utc())
    .bind::<Timestamp, _>(b.last_visit.naive_utc())
    .bind::<Integer, _>(b.visit_count)
    .bind::<Bool, _>(b.favorite)
    .bind::<Integer, _>(id)
    .execute(conn)?;

    Ok(id)
}

pub(super) fn count_rows(conn: &mut SqliteConnection, table: &Table) -> SqliteResult<usize> {
    let result: CountResult =
        sql_query(format!("SELECT COUNT(*) AS count FROM {}", table)).get_result(conn)?;
    Ok(result.count.max(0) as usize)
}

pub(super) fn max_id(conn: &mut SqliteConnection, table: &Table) -> SqliteResult<i32> {
    let result: IdResult =
        sql_query(format!("SELECT COALESCE(MAX(id), 0) AS id FROM {}", table)).get_result(conn)?;
    Ok(result.id)
}

/// Restart autoincrement numbering at 1.
pub(super) fn reset_sequence(conn: &mut SqliteConnection, name: &str) -> SqliteResult<()> {
    sql_query("DELETE FROM sqlite_sequence WHERE name = ?")
        .bind::<Text, _>(name)
        .execute(conn)?;
    debug!("reset sequence of {}", name);
    Ok(())
}

fn reset_sequence_if_empty(conn: &mut SqliteConnection, table: &Table) -> SqliteResult<()> {
    if count_rows(conn, table)? == 0 {
        reset_sequence(conn, table.as_str())?;
    }
    Ok(())
}

fn delete_ids(
    conn: &mut SqliteConnection,
    table: &Table,
    ids: &[i32],
    prune_tags: bool,
) -> SqliteResult<usize> {
    let mut removed = 0;
    for &id in ids {
        removed += sql_query(format!("DELETE FROM {} WHERE id = ?", table))
            .bind::<Integer, _>(id)
            .execute(conn)?;
    }
    if prune_tags {
        tags::prune_orphans(conn)?;
    }
    reset_sequence_if_empty(conn, table)?;
    Ok(removed)
}

impl BookmarkRepository for SqliteRepository {
    #[instrument(skip_all, level = "debug")]
    fn insert(&self, table: &Table, bookmark: &Bookmark) -> DomainResult<Bookmark> {
        let mut b = prepare(bookmark)?;
        let now = Utc::now();
        b.created_at = now;
        b.updated_at = now;
        b.last_visit = now;

        let associate = self.is_main(table);
        let inserted = self.with_tx(|conn| {
            let id = insert_one(conn, table, &b, associate)?;
            fetch_by_id(conn, table, id, associate)
        })?;
        Ok(inserted)
    }

    #[instrument(skip_all, level = "debug")]
    fn insert_bulk(&self, table: &Table, bookmarks: &[Bookmark]) -> DomainResult<()> {
        let associate = self.is_main(table);
        self.with_tx(|conn| {
            for bookmark in bookmarks {
                insert_one(conn, table, &prepare(bookmark)?, associate)?;
            }
            Ok(())
        })?;
        debug!("inserted {} bookmark(s) into {}", bookmarks.len(), table);
        Ok(())
    }

    #[instrument(skip_all, level = "debug")]
    fn update(&self, table: &Table, bookmark: &Bookmark) -> DomainResult<Bookmark> {
        let b = prepare(bookmark)?;
        let derive = self.is_main(table);
        let updated = self.with_tx(|conn| {
            let id = update_row(conn, table, &b)?;
            fetch_by_id(conn, table, id, derive)
        })?;
        Ok(updated)
    }

    #[instrument(skip_all, level = "debug")]
    fn update_with_tags(&self, table: &Table, bookmark: &Bookmark) -> DomainResult<Bookmark> {
        let b = prepare(bookmark)?;
        let main = self.is_main(table);
        let updated = self.with_tx(|conn| {
            let id = update_row(conn, table, &b)?;
            if main {
                tags::replace_tags(conn, table, &b.url, &b.formatted_tags())?;
            }
            fetch_by_id(conn, table, id, main)
        })?;
        Ok(updated)
    }

    #[instrument(skip_all, level = "debug")]
    fn delete(&self, table: &Table, id: i32) -> DomainResult<()> {
        let prune = self.is_main(table);
        self.with_tx(|conn| match delete_ids(conn, table, &[id], prune)? {
            0 => Err(not_found(table, &format!("id {}", id))),
            _ => Ok(()),
        })?;
        Ok(())
    }

    #[instrument(skip_all, level = "debug")]
    fn delete_bulk(&self, table: &Table, ids: &[i32]) -> DomainResult<usize> {
        let prune = self.is_main(table);
        let removed = self.with_tx(|conn| delete_ids(conn, table, ids, prune))?;
        debug!("deleted {} of {} requested from {}", removed, ids.len(), table);
        Ok(removed)
    }

    #[instrument(skip_all, level = "debug")]
    fn by_id(&self, table: &Table, id: i32) -> DomainResult<Bookmark> {
        let derive = self.is_main(table);
        Ok(self.with_conn(|conn| fetch_by_id(conn, table, id, derive))?)
    }

    #[instrument(skip_all, level = "debug")]
    fn by_url(&self, table: &Table, url: &str) -> DomainResult<Bookmark> {
        let url = normalize_url(url);
        let derive = self.is_main(table);
        let bookmark = self.with_conn(|conn| {
            let rows: Vec<DbBookmark> = sql_query(select_sql(table, "WHERE url = ?"))
                .bind::<Text, _>(url.as_str())
                .load(conn)?;
            hydrate(conn, rows, derive)?
                .into_iter()
                .next()
                .ok_or_else(|| not_found(table, &url))
        })?;
        Ok(bookmark)
    }

    #[instrument(skip_all, level = "debug")]
    fn by_query(&self, table: &Table, query: &str) -> DomainResult<Vec<Bookmark>> {
        let pattern = like_pattern(query.trim());
        let derive = self.is_main(table);
        let tag_match = if derive {
            format!(
                r"url IN (SELECT bt.bookmark_url FROM {RELATION_TABLE} bt
                 JOIN {TAGS_TABLE} t ON t.id = bt.tag_id WHERE t.name LIKE ? ESCAPE '\')"
            )
        } else {
            r"tags LIKE ? ESCAPE '\'".to_string()
        };
        let filter = format!(
            r#"WHERE CAST(id AS TEXT) LIKE ? ESCAPE '\' OR url LIKE ? ESCAPE '\'
               OR title LIKE ? ESCAPE '\' OR "desc" LIKE ? ESCAPE '\' OR {}"#,
            tag_match
        );

        let bookmarks = self.with_conn(|conn| {
            let rows: Vec<DbBookmark> = sql_query(select_sql(table, &filter))
                .bind::<Text, _>(pattern.as_str())
                .bind::<Text, _>(pattern.as_str())
                .bind::<Text, _>(pattern.as_str())
                .bind::<Text, _>(pattern.as_str())
                .bind::<Text, _>(pattern.as_str())
                .load(conn)?;
            if rows.is_empty() {
                return Err(no_match(table, query));
            }
            hydrate(conn, rows, derive)
        })?;
        Ok(bookmarks)
    }

    #[instrument(skip_all, level = "debug")]
    fn by_tag(&self, table: &Table, tag: &str) -> DomainResult<Vec<Bookmark>> {
        let tag = tag.trim();
        let derive = self.is_main(table);
        let filter = if derive {
            format!(
                "WHERE url IN (SELECT bt.bookmark_url FROM {RELATION_TABLE} bt \
                 JOIN {TAGS_TABLE} t ON t.id = bt.tag_id WHERE t.name = ?)"
            )
        } else {
            "WHERE instr(',' || tags, ',' || ? || ',') > 0".to_string()
        };

        let bookmarks = self.with_conn(|conn| {
            let rows: Vec<DbBookmark> = sql_query(select_sql(table, &filter))
                .bind::<Text, _>(tag)
                .load(conn)?;
            if rows.is_empty() {
                return Err(no_match(table, &format!("tag {}", tag)));
            }
            hydrate(conn, rows, derive)
        })?;
        Ok(bookmarks)
    }

    #[instrument(skip_all, level = "debug")]
    fn all(&self, table: &Table) -> DomainResult<Vec<Bookmark>> {
        let derive = self.is_main(table);
        let bookmarks = self.with_conn(|conn| {
            let rows = load_raw(conn, table)?;
            if rows.is_empty() {
                return Err(no_match(table, "*"));
            }
            hydrate(conn, rows, derive)
        })?;
        Ok(bookmarks)
    }

    #[instrument(skip_all, level = "debug")]
    fn record_visit(&self, table: &Table, id: i32) -> DomainResult<Bookmark> {
        let derive = self.is_main(table);
        let bookmark = self.with_tx(|conn| {
            let n = sql_query(format!(
                "UPDATE {} SET visit_count = visit_count + 1, last_visit = ? WHERE id = ?",
                table
            ))
            .bind::<Timestamp, _>(Utc::now().naive_utc())
            .bind::<Integer, _>(id)
            .execute(conn)?;
            if n == 0 {
                return Err(not_found(table, &format!("id {}", id)));
            }
            fetch_by_id(conn, table, id, derive)
        })?;
        Ok(bookmark)
    }

    #[instrument(skip_all, level = "debug")]
    fn toggle_favorite(&self, table: &Table, id: i32) -> DomainResult<Bookmark> {
        let derive = self.is_main(table);
        let bookmark = self.with_tx(|conn| {
            let n = sql_query(format!(
                "UPDATE {} SET favorite = NOT favorite, updated_at = ? WHERE id = ?",
                table
            ))
            .bind::<Timestamp, _>(Utc::now().naive_utc())
            .bind::<Integer, _>(id)
            .execute(conn)?;
            if n == 0 {
                return Err(not_found(table, &format!("id {}", id)));
            }
            fetch_by_id(conn, table, id, derive)
        })?;
        Ok(bookmark)
    }

    fn count(&self, table: &Table) -> DomainResult<usize> {
        Ok(self.with_conn(|conn| count_rows(conn, table))?)
    }

    fn max_id(&self, table: &Table) -> DomainResult<i32> {
        Ok(self.with_conn(|conn| max_id(conn, table))?)
    }

    fn is_empty(&self, main: &Table, deleted: &Table) -> DomainResult<bool> {
        let empty = self.with_conn(|conn| {
            Ok(max_id(conn, main)? == 0 && max_id(conn, deleted)? == 0)
        })?;
        Ok(empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::sqlite::schema::table_exists;
    use crate::util::testing::{init_test_env, setup_test_repo};

    #[test]
    fn given_open_repo_when_closed_twice_then_second_is_noop() {
        let _ = init_test_env();
        let (repo, _dir) = setup_test_repo();

        repo.close();
        assert!(repo.is_closed());
        repo.close();
        assert!(repo.is_closed());
    }

    #[test]
    fn given_closed_repo_when_reading_then_connection_closed() {
        let _ = init_test_env();
        let (repo, _dir) = setup_test_repo();
        repo.close();

        let result = repo.with_conn(|conn| count_rows(conn, &Table::new("bookmarks")?));
        assert!(matches!(result, Err(SqliteRepositoryError::ConnectionClosed)));
    }

    #[test]
    fn given_closed_repo_when_concurrent_close_then_taken_once() {
        let _ = init_test_env();
        let (repo, _dir) = setup_test_repo();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| repo.close());
            }
        });
        assert!(repo.is_closed());
    }

    #[test]
    fn given_rows_when_summary_then_counts_both_tables() {
        let _ = init_test_env();
        let (repo, _dir) = setup_test_repo();
        let main = repo.tables().main.clone();
        repo.insert(&main, &Bookmark::new("https://a.com", "A", "", "x").unwrap())
            .unwrap();

        let summary = repo.summary().unwrap();
        assert!(summary.starts_with(&repo.config().name));
        assert!(summary.ends_with("(main: 1, deleted: 0)"));
    }

    #[test]
    fn given_unknown_column_when_has_record_then_invalid() {
        let _ = init_test_env();
        let (repo, _dir) = setup_test_repo();
        let main = repo.tables().main.clone();

        let result = repo.has_record(&main, "desc; DROP TABLE x", "y");
        assert!(matches!(result, Err(SqliteRepositoryError::Invalid(_))));
        assert!(!repo.has_record(&main, "url", "https://none.com").unwrap());
    }

    #[test]
    fn given_trailing_slash_when_insert_then_url_stored_without_it() {
        let _ = init_test_env();
        let (repo, _dir) = setup_test_repo();
        let main = repo.tables().main.clone();

        let mut b = Bookmark::new("https://a.com", "A", "", "x").unwrap();
        b.url = "https://a.com/".to_string();
        let inserted = repo.insert(&main, &b).unwrap();

        assert_eq!(inserted.url, "https://a.com");
        assert!(repo.by_url(&main, "https://a.com/").is_ok());
    }

    #[test]
    fn given_wildcards_when_like_pattern_then_escaped() {
        assert_eq!(like_pattern("go"), "%go%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern(r"a_b\c"), r"%a\_b\\c%");
    }

    #[test]
    fn given_missing_table_when_set_deleted_then_created() {
        let _ = init_test_env();
        let (mut repo, _dir) = setup_test_repo();
        let trash = Table::new("trash").unwrap();

        repo.set_deleted(trash.clone()).unwrap();

        assert_eq!(repo.tables().deleted, trash);
        let exists = repo.with_conn(|conn| table_exists(conn, &trash)).unwrap();
        assert!(exists);
    }
}
