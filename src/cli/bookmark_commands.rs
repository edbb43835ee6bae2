// src/cli/bookmark_commands.rs
use crate::cli::display::{show_bookmarks, show_tags, write_bookmarks_as_json, Palette};
use crate::cli::error::{CliError, CliResult};
use crate::domain::bookmark::Bookmark;
use crate::domain::error::DomainError;
use crate::domain::repositories::repository::BookmarkRepository;
use crate::domain::tag::Tag;
use crate::infrastructure::repositories::sqlite::repository::SqliteRepository;
use crate::infrastructure::repositories::sqlite::schema::Table;
use crossterm::style::Stylize;
use tracing::{debug, instrument};

// Helper function to get and validate IDs
pub(crate) fn get_ids(ids: &str) -> CliResult<Vec<i32>> {
    let mut parsed = ids
        .split(',')
        .map(|s| s.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| CliError::InvalidIdFormat(ids.to_string()))?;
    parsed.sort();
    parsed.dedup();
    Ok(parsed)
}

fn table_for(repo: &SqliteRepository, deleted: bool) -> Table {
    if deleted {
        repo.tables().deleted.clone()
    } else {
        repo.tables().main.clone()
    }
}

/// Zero rows is not a failure for listing commands.
fn or_empty(result: Result<Vec<Bookmark>, DomainError>) -> CliResult<Vec<Bookmark>> {
    match result {
        Ok(bookmarks) => Ok(bookmarks),
        Err(e) if e.is_not_found() => {
            debug!("{}", e);
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(repo))]
pub fn init(repo: &SqliteRepository) -> CliResult<()> {
    repo.ensure_initialized()?;
    println!("Database ready at: {}", repo.db_path().display());
    eprintln!("{}", repo.summary()?);
    Ok(())
}

#[instrument(skip(repo))]
pub fn add(
    repo: &SqliteRepository,
    url: &str,
    tags: Option<&str>,
    title: Option<&str>,
    desc: Option<&str>,
) -> CliResult<()> {
    let bookmark = Bookmark::new(
        url,
        title.unwrap_or_default(),
        desc.unwrap_or_default(),
        tags.unwrap_or_default(),
    )?;
    let inserted = repo
        .insert(&repo.tables().main, &bookmark)
        .map_err(|e| CliError::from(e).context("add"))?;

    eprintln!(
        "{} [{}] {}",
        "Added".green(),
        inserted.id.unwrap_or_default(),
        inserted.url
    );
    Ok(())
}

#[instrument(skip(repo))]
pub fn show(repo: &SqliteRepository, ids: &str, deleted: bool, palette: Palette) -> CliResult<()> {
    let table = table_for(repo, deleted);
    let mut bookmarks = Vec::new();
    for id in get_ids(ids)? {
        match repo.by_id(&table, id) {
            Ok(b) => bookmarks.push(b),
            Err(e) if e.is_not_found() => eprintln!("{}", format!("No bookmark with id {}", id).yellow()),
            Err(e) => return Err(e.into()),
        }
    }
    show_bookmarks(&bookmarks, palette)
}

#[instrument(skip(repo))]
pub fn search(
    repo: &SqliteRepository,
    query: Option<&str>,
    tag: Option<&str>,
    deleted: bool,
    is_json: bool,
    palette: Palette,
) -> CliResult<()> {
    let table = table_for(repo, deleted);

    let bookmarks = match (tag, query) {
        (Some(tag), None) => or_empty(repo.by_tag(&table, tag))?,
        (Some(tag), Some(query)) => {
            let needle = query.to_lowercase();
            or_empty(repo.by_tag(&table, tag))?
                .into_iter()
                .filter(|b| {
                    b.url.to_lowercase().contains(&needle)
                        || b.title.to_lowercase().contains(&needle)
                        || b.description.to_lowercase().contains(&needle)
                })
                .collect()
        }
        (None, Some(query)) => or_empty(repo.by_query(&table, query))?,
        (None, None) => or_empty(repo.all(&table))?,
    };

    if is_json {
        write_bookmarks_as_json(&bookmarks)
    } else {
        show_bookmarks(&bookmarks, palette)?;
        eprintln!("{} bookmark(s)", bookmarks.len());
        Ok(())
    }
}

#[instrument(skip(repo))]
pub fn update(
    repo: &SqliteRepository,
    id: i32,
    url: Option<&str>,
    title: Option<&str>,
    desc: Option<&str>,
    tags: Option<&str>,
) -> CliResult<()> {
    let main = repo.tables().main.clone();
    let mut bookmark = repo.by_id(&main, id)?;

    if let Some(url) = url {
        bookmark.url = url.to_string();
    }
    if title.is_some() || desc.is_some() {
        let title = title.map_or_else(|| bookmark.title.clone(), str::to_string);
        let desc = desc.map_or_else(|| bookmark.description.clone(), str::to_string);
        bookmark.update(title, desc);
    }

    let updated = match tags {
        Some(tags) => {
            bookmark.set_tags(Tag::parse_tags(tags)?);
            repo.update_with_tags(&main, &bookmark)?
        }
        None => repo.update(&main, &bookmark)?,
    };

    eprintln!("{} {}", "Updated".green(), updated);
    Ok(())
}

#[instrument(skip(repo))]
pub fn delete(repo: &SqliteRepository, ids: &str) -> CliResult<()> {
    let ids = get_ids(ids)?;
    let moved = repo.move_to_deleted(&ids)?;
    eprintln!("{} {} bookmark(s)", "Deleted".red(), moved);
    Ok(())
}

#[instrument(skip(repo))]
pub fn restore(repo: &SqliteRepository, ids: &str) -> CliResult<()> {
    let ids = get_ids(ids)?;
    let restored = repo.restore_from_deleted(&ids)?;
    eprintln!("{} {} bookmark(s)", "Restored".green(), restored);
    Ok(())
}

pub fn tags(repo: &SqliteRepository, palette: Palette) -> CliResult<()> {
    show_tags(&repo.counter_tags()?, palette)
}

/// Prints the url on stdout for a launcher to pick up.
#[instrument(skip(repo))]
pub fn visit(repo: &SqliteRepository, id: i32) -> CliResult<()> {
    let bookmark = repo.record_visit(&repo.tables().main, id)?;
    println!("{}", bookmark.url);
    Ok(())
}

#[instrument(skip(repo))]
pub fn fav(repo: &SqliteRepository, id: i32) -> CliResult<()> {
    let bookmark = repo.toggle_favorite(&repo.tables().main, id)?;
    let state = if bookmark.favorite { "favorite" } else { "not favorite" };
    eprintln!("[{}] {} is now {}", id, bookmark.url, state);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_valid_list_when_get_ids_then_sorted_unique() {
        assert_eq!(get_ids("3,1,2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(get_ids(" 4 ").unwrap(), vec![4]);
    }

    #[test]
    fn given_garbage_when_get_ids_then_invalid_format() {
        assert!(matches!(get_ids("1,x"), Err(CliError::InvalidIdFormat(_))));
        assert!(matches!(get_ids(""), Err(CliError::InvalidIdFormat(_))));
    }
}
