// src/infrastructure/repositories/sqlite/tags.rs
//
// Tag resolution runs on the caller's connection, so it joins whatever
// transaction the caller has open.

use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::QueryableByName;
use std::collections::BTreeMap;
use tracing::{debug, instrument, trace};

use super::error::{SqliteRepositoryError, SqliteResult};
use super::model::{IdResult, TagsFrequency};
use super::schema::{Table, RELATION_TABLE, TAGS_TABLE};
use crate::domain::tag::{Tag, NO_TAG};

#[derive(QueryableByName, Debug)]
struct TagName {
    #[diesel(sql_type = Text)]
    tag: String,
}

fn find_tag(conn: &mut SqliteConnection, name: &str) -> SqliteResult<Option<i32>> {
    let found = sql_query(format!("SELECT id FROM {} WHERE name = ?", TAGS_TABLE))
        .bind::<Text, _>(name)
        .get_result::<IdResult>(conn)
        .optional()?;
    Ok(found.map(|r| r.id))
}

/// Resolve a tag name to its id, creating the tag on first use.
///
/// An empty name resolves to `None` without touching the database.
pub fn get_or_create_tag(conn: &mut SqliteConnection, name: &str) -> SqliteResult<Option<i32>> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }

    if let Some(id) = find_tag(conn, name)? {
        return Ok(Some(id));
    }

    // OR IGNORE: a raced insert of the same name already satisfies us
    sql_query(format!("INSERT OR IGNORE INTO {} (name) VALUES (?)", TAGS_TABLE))
        .bind::<Text, _>(name)
        .execute(conn)?;

    match find_tag(conn, name)? {
        Some(id) => {
            trace!("created tag '{}' with id {}", name, id);
            Ok(Some(id))
        }
        None => Err(SqliteRepositoryError::OperationFailed(format!(
            "tag '{}' missing right after creation",
            name
        ))),
    }
}

/// Associate every tag of `tags_csv` with the bookmark, ignoring existing pairs.
///
/// Returns the number of newly created associations.
#[instrument(skip(conn), level = "debug")]
pub fn associate_tags(conn: &mut SqliteConnection, url: &str, tags_csv: &str) -> SqliteResult<usize> {
    let tags = Tag::parse_tags(tags_csv)?;
    let mut created = 0;

    for tag in &tags {
        let Some(tag_id) = get_or_create_tag(conn, tag.value())? else {
            continue;
        };
        created += sql_query(format!(
            "INSERT OR IGNORE INTO {} (bookmark_url, tag_id) VALUES (?, ?)",
            RELATION_TABLE
        ))
        .bind::<Text, _>(url)
        .bind::<diesel::sql_types::Integer, _>(tag_id)
        .execute(conn)?;
    }

    debug!("associated {} new tag(s) with {}", created, url);
    Ok(created)
}

/// Remove the named associations, then prune what lost its last association.
#[instrument(skip(conn), level = "debug")]
pub fn dissociate_tags(
    conn: &mut SqliteConnection,
    main: &Table,
    url: &str,
    tags_csv: &str,
) -> SqliteResult<usize> {
    let tags = Tag::parse_tags(tags_csv)?;
    let mut removed = 0;

    for tag in &tags {
        removed += sql_query(format!(
            "DELETE FROM {rel} WHERE bookmark_url = ? AND tag_id IN (SELECT id FROM {tags} WHERE name = ?)",
            rel = RELATION_TABLE,
            tags = TAGS_TABLE
        ))
        .bind::<Text, _>(url)
        .bind::<Text, _>(tag.value())
        .execute(conn)?;
    }

    prune_bookmark(conn, main, url)?;
    prune_orphans(conn)?;
    Ok(removed)
}

/// Make the bookmark's associations exactly `tags_csv` (`notag` when empty).
#[instrument(skip(conn), level = "debug")]
pub fn replace_tags(
    conn: &mut SqliteConnection,
    main: &Table,
    url: &str,
    tags_csv: &str,
) -> SqliteResult<()> {
    let mut wanted = Tag::parse_tags(tags_csv)?;
    if wanted.is_empty() {
        wanted.push(Tag::new(NO_TAG)?);
    }
    let wanted_csv = Tag::format_tags(&wanted);

    // add before removing: a bookmark must never pass through zero associations
    associate_tags(conn, url, &wanted_csv)?;

    let stale: Vec<String> = tags_for(conn, url)?
        .into_iter()
        .filter(|name| !wanted.iter().any(|t| t.value() == name))
        .collect();

    if !stale.is_empty() {
        dissociate_tags(conn, main, url, &stale.join(","))?;
    }
    Ok(())
}

/// Tag names associated with a bookmark, in association order.
pub fn tags_for(conn: &mut SqliteConnection, url: &str) -> SqliteResult<Vec<String>> {
    let rows: Vec<TagName> = sql_query(format!(
        "SELECT t.name AS tag FROM {rel} bt JOIN {tags} t ON t.id = bt.tag_id \
         WHERE bt.bookmark_url = ? ORDER BY bt.rowid",
        rel = RELATION_TABLE,
        tags = TAGS_TABLE
    ))
    .bind::<Text, _>(url)
    .load(conn)?;

    Ok(rows.into_iter().map(|r| r.tag).collect())
}

/// Delete the bookmark if it has no association left.
pub fn prune_bookmark(conn: &mut SqliteConnection, main: &Table, url: &str) -> SqliteResult<usize> {
    let n = sql_query(format!(
        "DELETE FROM {main} WHERE url = ? \
         AND NOT EXISTS (SELECT 1 FROM {rel} WHERE bookmark_url = ?)",
        rel = RELATION_TABLE
    ))
    .bind::<Text, _>(url)
    .bind::<Text, _>(url)
    .execute(conn)?;
    Ok(n)
}

/// Delete tags without any association.
pub fn prune_orphans(conn: &mut SqliteConnection) -> SqliteResult<usize> {
    let n = sql_query(format!(
        "DELETE FROM {tags} WHERE id NOT IN (SELECT DISTINCT tag_id FROM {rel})",
        tags = TAGS_TABLE,
        rel = RELATION_TABLE
    ))
    .execute(conn)?;
    if n > 0 {
        debug!("pruned {} orphan tag(s)", n);
    }
    Ok(n)
}

/// Usage count per tag, unused tags included with 0.
pub fn counter_tags(conn: &mut SqliteConnection) -> SqliteResult<BTreeMap<String, usize>> {
    let rows: Vec<TagsFrequency> = sql_query(format!(
        "SELECT t.name AS tag, COUNT(bt.tag_id) AS n \
         FROM {tags} t LEFT JOIN {rel} bt ON t.id = bt.tag_id \
         GROUP BY t.id, t.name",
        tags = TAGS_TABLE,
        rel = RELATION_TABLE
    ))
    .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|tf| (tf.tag, tf.n.max(0) as usize))
        .collect())
}
