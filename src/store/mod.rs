//! Local persistence: SQLite record store and crawl checkpoints.
//!
//! The store is the single source of truth for resumption. Checkpoint rows
//! (`crawl_windows`) live in the same database as the records they describe,
//! and a page's records are committed in the same transaction as its cursor
//! advance, so a checkpoint can never point past data that was not stored.

use std::fs::{File, OpenOptions};
use std::path::Path;

pub mod schema;
pub mod sqlite;

pub use sqlite::{CrawlWindow, SqliteStore, WindowStatus};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error (creating directories, lock files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be interpreted
    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

/// Open the advisory crawl lock for a database path.
///
/// The caller holds `try_write()` on the returned lock for the duration of a
/// crawl; a second crawler process against the same store fails fast instead
/// of interleaving checkpoint writes.
pub fn crawl_lock(db_path: &Path) -> Result<fd_lock::RwLock<File>, StoreError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let lock_path = db_path.with_extension("lock");
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;

    Ok(fd_lock::RwLock::new(file))
}
