// src/util/testing.rs

use std::env;
use std::sync::OnceLock;
use tempfile::TempDir;
use tracing::{debug, info, instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::config::{ENV_BACKUP_MAX, ENV_DB_NAME, ENV_HOME};
use crate::domain::bookmark::Bookmark;
use crate::infrastructure::repositories::sqlite::connection::SqliteConfig;
use crate::infrastructure::repositories::sqlite::repository::SqliteRepository;

/// Global test configuration, initialized exactly once.
#[derive(Debug)]
pub struct TestEnv {
    /// Name given to test databases
    pub db_name: &'static str,
}

static TEST_ENV: OnceLock<TestEnv> = OnceLock::new();

/// Initializes logging for tests exactly once.
pub fn init_test_env() -> &'static TestEnv {
    TEST_ENV.get_or_init(|| {
        setup_test_logging();
        info!("Test environment initialized");
        TestEnv {
            db_name: "test.db",
        }
    })
}

/// Honours `RUST_LOG`, silent by default.
fn setup_test_logging() {
    debug!("Attempting logger init from testing.rs");
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
        return;
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_test_writer()
            .with_filter(env_filter),
    );

    subscriber.try_init().unwrap_or_else(|e| {
        eprintln!("Error: Failed to set up logging: {}", e);
    });
}

/// Restores the `MARKS_*` environment variables on drop.
#[derive(Debug, Clone)]
pub struct EnvGuard {
    saved: Vec<(&'static str, Option<String>)>,
}

impl Default for EnvGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvGuard {
    pub fn new() -> Self {
        let saved = [ENV_HOME, ENV_DB_NAME, ENV_BACKUP_MAX]
            .into_iter()
            .map(|key| (key, env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    #[instrument(level = "trace")]
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Config for a database inside `dir`.
pub fn test_config(dir: &TempDir) -> SqliteConfig {
    let env_data = init_test_env();
    SqliteConfig::new(dir.path(), env_data.db_name)
}

/// Fresh repository in its own temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the repository is used.
pub fn setup_test_repo() -> (SqliteRepository, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let repo = SqliteRepository::open(test_config(&dir)).expect("Failed to open test repository");
    (repo, dir)
}

/// Bookmark fixture with title and description derived from the url.
pub fn bookmark(url: &str, tags: &str) -> Bookmark {
    Bookmark::new(url, format!("Title of {}", url).as_str(), "a description", tags)
        .expect("Failed to create test bookmark")
}
