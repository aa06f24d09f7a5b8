pub mod migrations;
pub mod models;
pub mod queries;
pub mod statement;

use anyhow::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::info;

/// Handle to the gateway's SQLite store.
///
/// Only the path is retained: every operation acquires its own connection
/// through `with_conn`, scoped to the closure and released when it returns.
/// Workers therefore never share mutable connection state; overlapping
/// writes rely on SQLite's own locking.
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self {
            path: path.to_path_buf(),
        };

        store.with_conn(|conn| {
            // WAL mode for concurrent reads; persists in the database file
            conn.pragma_update(None, "journal_mode", "WAL")?;
            migrations::run(conn)
        })?;

        info!("Store opened at {}", path.display());
        Ok(store)
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = Connection::open(&self.path)?;
        f(&conn)
    }
}
