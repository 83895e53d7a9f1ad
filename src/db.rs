//! SQLite connection management.
//!
//! The index store is a single SQLite file opened through a `sqlx` pool in
//! WAL mode: one writer (the index builder) and any number of concurrent
//! readers, with readers keeping their snapshot until the writer commits.
//! The pool is acquired once at startup and passed explicitly to every
//! component through [`SkillStore`](crate::store::SkillStore).

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;

/// Open a pool on the configured database file.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    connect_path(&config.db.path).await
}

/// Open a pool on `db_path`, creating the file and parent directories if
/// they don't exist.
pub async fn connect_path(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
