// src/infrastructure/repositories/sqlite/schema.rs
//
// Bookmark tables are created from one template so that the live table, the
// soft-deleted table and the reorder staging table share a schema. Table
// names are interpolated into SQL, hence `Table` only admits plain
// identifiers.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Text;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, instrument};

use super::error::{SqliteRepositoryError, SqliteResult};
use super::model::CountResult;

pub const TAGS_TABLE: &str = "tags";
pub const RELATION_TABLE: &str = "bookmark_tags";
pub const DEFAULT_MAIN_TABLE: &str = "bookmarks";
pub const DEFAULT_DELETED_TABLE: &str = "deleted_bookmarks";
const STAGING_PREFIX: &str = "temp_";
const CLEANUP_TRIGGER: &str = "cleanup_bookmark_and_tags";

#[derive(QueryableByName, Debug)]
struct Referenced {
    #[diesel(sql_type = Text)]
    name: String,
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Name of a bookmark table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Table(String);

impl Table {
    pub fn new<S: Into<String>>(name: S) -> SqliteResult<Self> {
        let name = name.into();
        if !identifier_re().is_match(&name) || is_reserved(&name) {
            return Err(SqliteRepositoryError::InvalidTableName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Staging table used while rebuilding this table.
    pub fn staging(&self) -> Table {
        Table(format!("{}{}", STAGING_PREFIX, self.0))
    }
}

fn is_reserved(name: &str) -> bool {
    name == TAGS_TABLE || name == RELATION_TABLE || name.starts_with("sqlite_")
}

impl TryFrom<String> for Table {
    type Error = SqliteRepositoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Table::new(value)
    }
}

impl From<Table> for String {
    fn from(table: Table) -> Self {
        table.0
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The table pair a repository operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tables {
    pub main: Table,
    pub deleted: Table,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            main: Table(DEFAULT_MAIN_TABLE.to_string()),
            deleted: Table(DEFAULT_DELETED_TABLE.to_string()),
        }
    }
}

fn bookmark_table_ddl(table: &Table) -> String {
    format!(
        r#"
    CREATE TABLE IF NOT EXISTS {table} (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        url         TEXT    NOT NULL UNIQUE,
        title       TEXT    NOT NULL DEFAULT '',
        tags        TEXT    NOT NULL DEFAULT 'notag,',
        "desc"      TEXT    NOT NULL DEFAULT '',
        created_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        last_visit  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        visit_count INTEGER NOT NULL DEFAULT 0,
        favorite    BOOLEAN NOT NULL DEFAULT FALSE
    );"#
    )
}

fn tag_tables_ddl(main: &Table) -> String {
    format!(
        r#"
    CREATE TABLE IF NOT EXISTS {TAGS_TABLE} (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT    NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS {RELATION_TABLE} (
        bookmark_url TEXT    NOT NULL,
        tag_id       INTEGER NOT NULL,
        FOREIGN KEY (bookmark_url) REFERENCES {main}(url) ON DELETE CASCADE ON UPDATE CASCADE,
        FOREIGN KEY (tag_id) REFERENCES {TAGS_TABLE}(id) ON DELETE CASCADE,
        PRIMARY KEY (bookmark_url, tag_id)
    );

    CREATE INDEX IF NOT EXISTS idx_{RELATION_TABLE}_tag_id
    ON {RELATION_TABLE}(tag_id);

    CREATE TRIGGER IF NOT EXISTS {CLEANUP_TRIGGER}
    AFTER DELETE ON {RELATION_TABLE}
    BEGIN
        -- drop the bookmark once it has no association left
        DELETE FROM {main}
        WHERE url = OLD.bookmark_url
          AND NOT EXISTS (
              SELECT 1 FROM {RELATION_TABLE} WHERE bookmark_url = OLD.bookmark_url
          );

        -- drop tags nobody uses anymore
        DELETE FROM {TAGS_TABLE}
        WHERE id NOT IN (SELECT DISTINCT tag_id FROM {RELATION_TABLE});
    END;"#
    )
}

/// Create a bookmark table, no-op if it exists.
#[instrument(skip(conn), level = "debug")]
pub fn create_table(conn: &mut SqliteConnection, table: &Table) -> SqliteResult<()> {
    debug!("creating table: {}", table);
    conn.batch_execute(&bookmark_table_ddl(table))?;
    Ok(())
}

/// Create tags, junction table and cleanup trigger bound to `main`.
#[instrument(skip(conn), level = "debug")]
pub fn create_tag_tables(conn: &mut SqliteConnection, main: &Table) -> SqliteResult<()> {
    debug!("creating tag tables for: {}", main);
    conn.batch_execute(&tag_tables_ddl(main))?;
    Ok(())
}

/// Table the junction's url foreign key points at, `None` before the
/// junction exists.
pub fn tags_bound_to(conn: &mut SqliteConnection) -> SqliteResult<Option<String>> {
    let rows: Vec<Referenced> = sql_query(format!(
        r#"SELECT "table" AS name FROM pragma_foreign_key_list('{RELATION_TABLE}')
           WHERE "from" = 'bookmark_url'"#
    ))
    .load(conn)?;
    Ok(rows.into_iter().next().map(|r| r.name))
}

/// Bind the junction and cleanup trigger to `main`.
///
/// An empty junction bound to another table is rebuilt. One that still
/// holds associations is left alone and the call fails with `TagsBound`.
#[instrument(skip(conn), level = "debug")]
pub fn bind_tag_tables(conn: &mut SqliteConnection, main: &Table) -> SqliteResult<()> {
    let bound = match tags_bound_to(conn)? {
        Some(bound) if bound != main.as_str() => bound,
        _ => return create_tag_tables(conn, main),
    };

    let used: CountResult = sql_query(format!("SELECT COUNT(*) AS count FROM {RELATION_TABLE}"))
        .get_result(conn)?;
    if used.count > 0 {
        return Err(SqliteRepositoryError::TagsBound {
            table: main.to_string(),
            bound,
        });
    }

    debug!("rebinding tag tables from {} to {}", bound, main);
    conn.batch_execute(&format!(
        "DROP TRIGGER IF EXISTS {CLEANUP_TRIGGER}; DROP TABLE IF EXISTS {RELATION_TABLE};"
    ))?;
    create_tag_tables(conn, main)
}

/// Create the full schema for a table pair.
pub fn init_schema(conn: &mut SqliteConnection, tables: &Tables) -> SqliteResult<()> {
    create_table(conn, &tables.main)?;
    create_table(conn, &tables.deleted)?;
    bind_tag_tables(conn, &tables.main)
}

#[instrument(skip(conn), level = "debug")]
pub fn drop_table(conn: &mut SqliteConnection, table: &Table) -> SqliteResult<()> {
    sql_query(format!("DROP TABLE IF EXISTS {}", table)).execute(conn)?;
    debug!("dropped table: {}", table);
    Ok(())
}

#[instrument(skip(conn), level = "debug")]
pub fn rename_table(conn: &mut SqliteConnection, old: &Table, new: &Table) -> SqliteResult<()> {
    sql_query(format!("ALTER TABLE {} RENAME TO {}", old, new)).execute(conn)?;
    debug!("renamed table {} to {}", old, new);
    Ok(())
}

/// Check the catalog for a table of that name.
pub fn table_exists(conn: &mut SqliteConnection, table: &Table) -> SqliteResult<bool> {
    let result: CountResult =
        sql_query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind::<Text, _>(table.as_str())
            .get_result(conn)?;

    debug!("table '{}' exists: {}", table, result.count > 0);
    Ok(result.count > 0)
}
