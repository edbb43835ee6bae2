// src/cli/args.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// A personal bookmark store for the terminal
pub struct Cli {
    /// Database to operate on (file name in the data directory)
    #[arg(short = 'n', long = "name", value_name = "DB")]
    pub name: Option<String>,

    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Print a default configuration file and exit
    #[arg(long = "generate-config")]
    pub generate_config: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the bookmark database
    Init,
    /// Add a bookmark
    Add {
        url: String,
        /// list of tags, separated by comma, no blanks in between
        tags: Option<String>,
        #[arg(long = "title", help = "title")]
        title: Option<String>,
        #[arg(long = "desc", help = "description")]
        desc: Option<String>,
    },
    /// Show bookmarks (list of ids, separated by comma, no blanks)
    Show {
        ids: String,
        #[arg(long = "deleted", help = "read from the deleted bookmarks")]
        deleted: bool,
    },
    /// Search bookmarks by substring and/or tag
    Search {
        /// substring matched against id, url, title, description and tags
        query: Option<String>,
        #[arg(short = 't', long = "tag", help = "only bookmarks carrying this tag")]
        tag: Option<String>,
        #[arg(long = "deleted", help = "search the deleted bookmarks")]
        deleted: bool,
        #[arg(long = "json", help = "output as json")]
        is_json: bool,
    },
    /// Update a bookmark
    Update {
        id: i32,
        #[arg(long = "url")]
        url: Option<String>,
        #[arg(long = "title")]
        title: Option<String>,
        #[arg(long = "desc")]
        desc: Option<String>,
        #[arg(short = 't', long = "tags", help = "replace the tag list")]
        tags: Option<String>,
    },
    /// Move bookmarks to the deleted table
    Delete {
        /// list of ids, separated by comma, no blanks
        ids: String,
    },
    /// Restore bookmarks from the deleted table
    Restore {
        /// list of ids of deleted bookmarks, separated by comma, no blanks
        ids: String,
    },
    /// Show all tags with their usage count
    Tags,
    /// Record a visit and print the url
    Visit { id: i32 },
    /// Toggle the favorite flag
    Fav { id: i32 },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Backup management
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Show database information
    Info,
    /// Renumber ids without gaps
    Reorder,
    /// Reclaim unused space
    Vacuum,
    /// Delete all bookmarks and tags irreversibly
    Drop {
        #[arg(long = "force", help = "required, there is no undo")]
        force: bool,
    },
    /// List databases in the data directory
    List,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Create a timestamped backup and purge expired ones
    Create {
        #[arg(short = 'f', long = "force", help = "overwrite a backup of the same name")]
        force: bool,
    },
    /// List backups, oldest first
    List,
    /// Delete backups beyond the retention limit
    Purge,
}
