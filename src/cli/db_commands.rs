// src/cli/db_commands.rs
use crate::cli::error::{CliError, CliResult};
use crate::infrastructure::repositories::sqlite::backup::{list_databases, BackupManager};
use crate::infrastructure::repositories::sqlite::connection::{establish, SqliteConfig};
use crate::infrastructure::repositories::sqlite::error::{SqliteRepositoryError, SqliteResult};
use crate::infrastructure::repositories::sqlite::repository::SqliteRepository;
use crate::infrastructure::repositories::sqlite::schema::{table_exists, Table};
use crossterm::style::Stylize;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(repo))]
pub fn info(repo: &SqliteRepository) -> CliResult<()> {
    let cfg = repo.config();
    let manager = BackupManager::from_config(cfg);

    println!("Program Version: {}", env!("CARGO_PKG_VERSION"));
    println!("\nDatabase:");
    println!("  Path: {}", repo.db_path().display());
    println!("  Summary: {}", repo.summary()?);
    println!("  Size: {} bytes (vacuum above {})", repo.size()?, cfg.max_bytes_size);
    println!("  Tables: {} / {}", repo.tables().main, repo.tables().deleted);

    let tags = repo.counter_tags()?;
    println!("  Tags: {}", tags.len());

    println!("\nBackups:");
    println!("  Directory: {}", manager.dir().display());
    if manager.is_enabled() {
        let count = match manager.list_backups() {
            Ok(b) => b.len(),
            Err(SqliteRepositoryError::BackupNotFound(_)) => 0,
            Err(e) => return Err(e.into()),
        };
        println!("  Kept: {} of {}", count, manager.limit());
    } else {
        println!("  Disabled");
    }
    Ok(())
}

#[instrument(skip(repo))]
pub fn reorder(repo: &SqliteRepository) -> CliResult<()> {
    let tables = repo.tables().clone();
    repo.reorder_ids(&tables.main)?;
    repo.reorder_ids(&tables.deleted)?;
    eprintln!("{} {}", "Reordered".green(), repo.summary()?);
    Ok(())
}

#[instrument(skip(repo))]
pub fn vacuum(repo: &SqliteRepository) -> CliResult<()> {
    let before = repo.size()?;
    repo.vacuum()?;
    eprintln!("{} {} -> {} bytes", "Vacuumed".green(), before, repo.size()?);
    Ok(())
}

/// Wipe everything. Refused without `--force`.
#[instrument(skip(repo))]
pub fn drop_db(repo: &SqliteRepository, force: bool) -> CliResult<()> {
    if !force {
        return Err(CliError::InvalidInput(
            "dropping the database cannot be undone, pass --force".to_string(),
        ));
    }
    repo.ensure_not_empty()?;
    repo.secure_wipe()?;
    eprintln!("{} {}", "Dropped".red(), repo.summary()?);
    Ok(())
}

/// Whether the file already holds `main`. Opening it this way creates nothing.
fn is_bookmark_db(path: &Path, main: &Table) -> SqliteResult<bool> {
    let mut conn = establish(path)?;
    table_exists(&mut conn, main)
}

/// Databases next to the configured one. Files without the main table are
/// reported but not opened.
#[instrument]
pub fn list(cfg: &SqliteConfig) -> CliResult<()> {
    if !cfg.path.is_dir() {
        eprintln!("No databases in {}", cfg.path.display());
        return Ok(());
    }
    for path in list_databases(&cfg.path)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match is_bookmark_db(&path, &cfg.tables.main) {
            Ok(true) => {}
            Ok(false) => {
                debug!("skipping {}: no table {}", path.display(), cfg.tables.main);
                println!("{} (not a bookmark database)", name);
                continue;
            }
            Err(e) => {
                println!("{} ({})", name, e);
                continue;
            }
        }
        let mut db_cfg = cfg.clone();
        db_cfg.name = name.clone();
        match SqliteRepository::open(db_cfg) {
            Ok(repo) => println!("{}", repo.summary()?),
            Err(e) => println!("{} ({})", name, e),
        }
    }
    Ok(())
}

#[instrument(skip(repo))]
pub fn backup_create(repo: &SqliteRepository, force: bool) -> CliResult<()> {
    let manager = BackupManager::from_config(repo.config());
    repo.ensure_not_empty()?;
    let path = manager.create(force)?;
    println!("{}", path.display());

    for removed in manager.purge_expired()? {
        info!("expired backup removed: {}", removed.display());
        eprintln!("{} {}", "Removed".yellow(), removed.display());
    }
    Ok(())
}

pub fn backup_list(repo: &SqliteRepository) -> CliResult<()> {
    let manager = BackupManager::from_config(repo.config());
    for path in manager.list_backups()? {
        println!("{}", path.display());
    }
    Ok(())
}

pub fn backup_purge(repo: &SqliteRepository) -> CliResult<()> {
    let manager = BackupManager::from_config(repo.config());
    let removed = manager.purge_expired()?;
    for path in &removed {
        eprintln!("{} {}", "Removed".yellow(), path.display());
    }
    eprintln!("{} backup(s) purged", removed.len());
    Ok(())
}
