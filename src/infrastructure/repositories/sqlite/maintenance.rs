// src/infrastructure/repositories/sqlite/maintenance.rs
//
// Housekeeping on a bookmark database: vacuum, id defragmentation by
// rebuild-and-swap, secure wipe and initialization checks.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Bool, Integer, Text, Timestamp};
use tracing::{debug, info, instrument, warn};

use super::error::{SqliteRepositoryError, SqliteResult};
use super::model::SizeResult;
use super::repository::{self as records, SqliteRepository};
use super::schema::{create_table, drop_table, rename_table, table_exists, Table, TAGS_TABLE};
use super::tags;

/// Database file size in bytes as reported by the pager.
pub fn size(conn: &mut SqliteConnection) -> SqliteResult<u64> {
    let result: SizeResult = sql_query(
        "SELECT page_count * page_size AS size FROM pragma_page_count(), pragma_page_size()",
    )
    .get_result(conn)?;
    Ok(result.size.max(0) as u64)
}

pub fn vacuum(conn: &mut SqliteConnection) -> SqliteResult<()> {
    conn.batch_execute("VACUUM;")
        .map_err(|e| SqliteRepositoryError::from(e).in_step("vacuum", "*"))?;
    debug!("vacuum done");
    Ok(())
}

/// Vacuum when the database is larger than `threshold` bytes.
///
/// Returns whether a vacuum ran.
#[instrument(skip(conn), level = "debug")]
pub fn check_size(conn: &mut SqliteConnection, threshold: u64) -> SqliteResult<bool> {
    let current = size(conn)?;
    if current <= threshold {
        return Ok(false);
    }
    info!("database size {} exceeds {}, vacuuming", current, threshold);
    vacuum(conn)?;
    Ok(true)
}

/// Renumber the ids of `table` to 1..N keeping their order.
///
/// Rows are copied into a staging table which then replaces the original.
/// The copy, drop and rename run in one transaction; foreign key
/// enforcement is off meanwhile so dropping the live table leaves the
/// junction rows alone (they reference urls, which do not change).
#[instrument(skip(conn), level = "debug")]
pub fn reorder_table(conn: &mut SqliteConnection, table: &Table) -> SqliteResult<()> {
    if !table_exists(conn, table)? {
        return Err(SqliteRepositoryError::NotInitialized(table.to_string()));
    }

    let rows = records::load_raw(conn, table)?;
    if rows.is_empty() {
        debug!("{} is empty, nothing to reorder", table);
        return Ok(());
    }
    let staging = table.staging();

    // neither pragma has any effect inside a transaction
    conn.batch_execute("PRAGMA foreign_keys = OFF; PRAGMA legacy_alter_table = ON;")
        .map_err(|e| SqliteRepositoryError::from(e).in_step("prepare", table.as_str()))?;

    let swapped = conn.transaction::<_, SqliteRepositoryError, _>(|conn| {
        drop_table(conn, &staging).map_err(|e| e.in_step("drop staging", staging.as_str()))?;
        create_table(conn, &staging).map_err(|e| e.in_step("create staging", staging.as_str()))?;

        for (n, row) in rows.iter().enumerate() {
            sql_query(format!(
                r#"INSERT INTO {staging} (id, url, title, tags, "desc", created_at, last_visit, updated_at, visit_count, favorite)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
            ))
            .bind::<Integer, _>(n as i32 + 1)
            .bind::<Text, _>(row.url.as_str())
            .bind::<Text, _>(row.title.as_str())
            .bind::<Text, _>(row.tags.as_str())
            .bind::<Text, _>(row.desc.as_str())
            .bind::<Timestamp, _>(row.created_at)
            .bind::<Timestamp, _>(row.last_visit)
            .bind::<Timestamp, _>(row.updated_at)
            .bind::<Integer, _>(row.visit_count)
            .bind::<Bool, _>(row.favorite)
            .execute(conn)
            .map_err(SqliteRepositoryError::maintenance("copy", staging.as_str()))?;
        }

        drop_table(conn, table).map_err(|e| e.in_step("drop", table.as_str()))?;
        rename_table(conn, &staging, table).map_err(|e| e.in_step("rename", table.as_str()))?;
        Ok(())
    });

    let restored = conn
        .batch_execute("PRAGMA legacy_alter_table = OFF; PRAGMA foreign_keys = ON;")
        .map_err(|e| SqliteRepositoryError::from(e).in_step("restore pragmas", table.as_str()));

    swapped?;
    restored?;
    info!("reordered {} row(s) of {}", rows.len(), table);
    Ok(())
}

/// Clean up after a reorder that died between creating and renaming the
/// staging table.
///
/// With the original still present the staging copy is discarded,
/// otherwise the staging table is the complete copy and takes its place.
#[instrument(skip(conn), level = "debug")]
pub fn recover_interrupted_reorder(conn: &mut SqliteConnection, table: &Table) -> SqliteResult<()> {
    let staging = table.staging();
    if !table_exists(conn, &staging)? {
        return Ok(());
    }

    if table_exists(conn, table)? {
        warn!("dropping stale staging table {}", staging);
        drop_table(conn, &staging).map_err(|e| e.in_step("drop staging", staging.as_str()))?;
        return Ok(());
    }

    warn!("{} missing, promoting staging table {}", table, staging);
    conn.batch_execute("PRAGMA legacy_alter_table = ON;")?;
    let renamed = rename_table(conn, &staging, table).map_err(|e| e.in_step("rename", table.as_str()));
    conn.batch_execute("PRAGMA legacy_alter_table = OFF;")?;
    renamed
}

/// Delete every row of both tables and all tags, reset their sequences and
/// vacuum.
#[instrument(skip(conn), level = "debug")]
pub fn secure_wipe(conn: &mut SqliteConnection, main: &Table, deleted: &Table) -> SqliteResult<()> {
    conn.transaction::<_, SqliteRepositoryError, _>(|conn| {
        for table in [main, deleted] {
            sql_query(format!("DELETE FROM {}", table))
                .execute(conn)
                .map_err(SqliteRepositoryError::maintenance("delete", table.as_str()))?;
        }
        tags::prune_orphans(conn)?;
        for name in [main.as_str(), deleted.as_str(), TAGS_TABLE] {
            records::reset_sequence(conn, name)?;
        }
        Ok(())
    })?;

    vacuum(conn)?;
    info!("wiped {} and {}", main, deleted);
    Ok(())
}

impl SqliteRepository {
    pub fn size(&self) -> SqliteResult<u64> {
        self.with_conn(size)
    }

    pub fn vacuum(&self) -> SqliteResult<()> {
        self.with_conn(vacuum)
    }

    pub fn check_size(&self, threshold: u64) -> SqliteResult<bool> {
        self.with_conn(|conn| check_size(conn, threshold))
    }

    pub fn reorder_ids(&self, table: &Table) -> SqliteResult<()> {
        self.with_conn(|conn| reorder_table(conn, table))
    }

    /// Irreversibly empty the database. No confirmation is asked.
    pub fn secure_wipe(&self) -> SqliteResult<()> {
        let tables = self.tables().clone();
        self.with_conn(|conn| secure_wipe(conn, &tables.main, &tables.deleted))
    }

    pub fn is_initialized(&self) -> SqliteResult<bool> {
        let main = self.tables().main.clone();
        self.with_conn(|conn| table_exists(conn, &main))
    }

    pub fn ensure_initialized(&self) -> SqliteResult<()> {
        if self.is_initialized()? {
            Ok(())
        } else {
            Err(SqliteRepositoryError::NotInitialized(
                self.tables().main.to_string(),
            ))
        }
    }

    /// Fails with `Empty` when neither table ever held a row.
    pub fn ensure_not_empty(&self) -> SqliteResult<()> {
        self.ensure_initialized()?;
        let tables = self.tables().clone();
        let empty = self.with_conn(|conn| {
            Ok(records::max_id(conn, &tables.main)? == 0 && records::max_id(conn, &tables.deleted)? == 0)
        })?;
        if empty {
            return Err(SqliteRepositoryError::Empty(self.name().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::sqlite::schema::{init_schema, Tables};

    fn setup() -> (SqliteConnection, Tables) {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        conn.batch_execute("PRAGMA foreign_keys = ON;").unwrap();
        let tables = Tables::default();
        init_schema(&mut conn, &tables).unwrap();
        (conn, tables)
    }

    fn ids(conn: &mut SqliteConnection, table: &Table) -> Vec<i32> {
        records::load_raw(conn, table)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    #[test]
    fn given_gaps_when_reorder_then_ids_contiguous_and_tags_kept() {
        let (mut conn, tables) = setup();
        conn.batch_execute(
            "INSERT INTO bookmarks (id, url, title) VALUES (3, 'https://a.com', 'A');
             INSERT INTO bookmarks (id, url, title) VALUES (7, 'https://b.com', 'B');
             INSERT INTO bookmarks (id, url, title) VALUES (9, 'https://c.com', 'C');",
        )
        .unwrap();
        tags::associate_tags(&mut conn, "https://b.com", "keep,").unwrap();

        reorder_table(&mut conn, &tables.main).unwrap();

        assert_eq!(ids(&mut conn, &tables.main), vec![1, 2, 3]);
        let rows = records::load_raw(&mut conn, &tables.main).unwrap();
        assert_eq!(rows[1].url, "https://b.com");
        assert_eq!(tags::tags_for(&mut conn, "https://b.com").unwrap(), vec!["keep"]);
        assert!(!table_exists(&mut conn, &tables.main.staging()).unwrap());
    }

    #[test]
    fn given_reordered_table_when_deleting_junction_then_trigger_still_works() {
        let (mut conn, tables) = setup();
        conn.batch_execute("INSERT INTO bookmarks (id, url) VALUES (5, 'https://a.com');")
            .unwrap();
        tags::associate_tags(&mut conn, "https://a.com", "t,").unwrap();
        reorder_table(&mut conn, &tables.main).unwrap();

        conn.batch_execute("DELETE FROM bookmark_tags;").unwrap();

        assert_eq!(records::count_rows(&mut conn, &tables.main).unwrap(), 0);
    }

    #[test]
    fn given_empty_table_when_reorder_then_noop() {
        let (mut conn, tables) = setup();
        reorder_table(&mut conn, &tables.deleted).unwrap();
        assert!(table_exists(&mut conn, &tables.deleted).unwrap());
    }

    #[test]
    fn given_missing_table_when_reorder_then_not_initialized() {
        let (mut conn, _) = setup();
        let missing = Table::new("nothing_here").unwrap();
        assert!(matches!(
            reorder_table(&mut conn, &missing),
            Err(SqliteRepositoryError::NotInitialized(_))
        ));
    }

    #[test]
    fn given_stale_staging_and_original_when_recover_then_staging_dropped() {
        let (mut conn, tables) = setup();
        create_table(&mut conn, &tables.main.staging()).unwrap();

        recover_interrupted_reorder(&mut conn, &tables.main).unwrap();

        assert!(table_exists(&mut conn, &tables.main).unwrap());
        assert!(!table_exists(&mut conn, &tables.main.staging()).unwrap());
    }

    #[test]
    fn given_staging_without_original_when_recover_then_promoted() {
        let (mut conn, tables) = setup();
        let staging = tables.deleted.staging();
        create_table(&mut conn, &staging).unwrap();
        conn.batch_execute("INSERT INTO temp_deleted_bookmarks (url) VALUES ('https://a.com');")
            .unwrap();
        drop_table(&mut conn, &tables.deleted).unwrap();

        recover_interrupted_reorder(&mut conn, &tables.deleted).unwrap();

        assert!(!table_exists(&mut conn, &staging).unwrap());
        assert_eq!(records::count_rows(&mut conn, &tables.deleted).unwrap(), 1);
    }

    #[test]
    fn given_rows_when_secure_wipe_then_everything_reset() {
        let (mut conn, tables) = setup();
        conn.batch_execute(
            "INSERT INTO bookmarks (url) VALUES ('https://a.com');
             INSERT INTO deleted_bookmarks (url) VALUES ('https://b.com');",
        )
        .unwrap();
        tags::associate_tags(&mut conn, "https://a.com", "x,").unwrap();

        secure_wipe(&mut conn, &tables.main, &tables.deleted).unwrap();

        assert_eq!(records::max_id(&mut conn, &tables.main).unwrap(), 0);
        assert_eq!(records::max_id(&mut conn, &tables.deleted).unwrap(), 0);
        assert!(tags::counter_tags(&mut conn).unwrap().is_empty());

        conn.batch_execute("INSERT INTO bookmarks (url) VALUES ('https://c.com');")
            .unwrap();
        assert_eq!(ids(&mut conn, &tables.main), vec![1]);
    }

    #[test]
    fn given_tiny_threshold_when_check_size_then_vacuums() {
        let (mut conn, _) = setup();
        assert!(size(&mut conn).unwrap() > 0);
        assert!(check_size(&mut conn, 0).unwrap());
        assert!(!check_size(&mut conn, u64::MAX).unwrap());
    }
}
