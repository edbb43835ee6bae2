// src/cli/mod.rs
use crate::cli::args::{BackupCommands, Cli, Commands, DbCommands};
use crate::cli::display::Palette;
use crate::cli::error::CliResult;
use crate::config::Settings;
use crate::infrastructure::repositories::sqlite::connection::ensure_db_extension;
use crate::infrastructure::repositories::sqlite::repository::SqliteRepository;
use tracing::debug;

pub mod args;
pub mod bookmark_commands;
pub mod db_commands;
pub mod display;
pub mod error;

/// Composition root: resolve the database, open it once, run the command.
pub fn execute_command(cli: Cli, settings: &Settings) -> CliResult<()> {
    if cli.generate_config {
        println!("{}", crate::config::generate_default_config());
        return Ok(());
    }
    let Some(command) = cli.command else {
        return Ok(());
    };

    let mut cfg = settings.sqlite_config()?;
    if let Some(name) = cli.name.as_deref() {
        cfg.name = ensure_db_extension(name);
    }
    let palette = Palette::new(cli.no_color);

    if let Commands::Db {
        command: DbCommands::List,
    } = command
    {
        return db_commands::list(&cfg);
    }

    debug!("opening {}", cfg.fullpath().display());
    let repo = SqliteRepository::open(cfg)?;

    let result = match command {
        Commands::Init => bookmark_commands::init(&repo),
        Commands::Add {
            url,
            tags,
            title,
            desc,
        } => bookmark_commands::add(
            &repo,
            &url,
            tags.as_deref(),
            title.as_deref(),
            desc.as_deref(),
        ),
        Commands::Show { ids, deleted } => bookmark_commands::show(&repo, &ids, deleted, palette),
        Commands::Search {
            query,
            tag,
            deleted,
            is_json,
        } => bookmark_commands::search(
            &repo,
            query.as_deref(),
            tag.as_deref(),
            deleted,
            is_json,
            palette,
        ),
        Commands::Update {
            id,
            url,
            title,
            desc,
            tags,
        } => bookmark_commands::update(
            &repo,
            id,
            url.as_deref(),
            title.as_deref(),
            desc.as_deref(),
            tags.as_deref(),
        ),
        Commands::Delete { ids } => bookmark_commands::delete(&repo, &ids),
        Commands::Restore { ids } => bookmark_commands::restore(&repo, &ids),
        Commands::Tags => bookmark_commands::tags(&repo, palette),
        Commands::Visit { id } => bookmark_commands::visit(&repo, id),
        Commands::Fav { id } => bookmark_commands::fav(&repo, id),
        Commands::Db { command } => match command {
            DbCommands::Info => db_commands::info(&repo),
            DbCommands::Reorder => db_commands::reorder(&repo),
            DbCommands::Vacuum => db_commands::vacuum(&repo),
            DbCommands::Drop { force } => db_commands::drop_db(&repo, force),
            DbCommands::List => db_commands::list(repo.config()),
        },
        Commands::Backup { command } => match command {
            BackupCommands::Create { force } => db_commands::backup_create(&repo, force),
            BackupCommands::List => db_commands::backup_list(&repo),
            BackupCommands::Purge => db_commands::backup_purge(&repo),
        },
    };

    repo.close();
    result
}
