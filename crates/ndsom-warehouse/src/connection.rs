//! Lazily opened, memoized `DuckDB` connection.

use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ::duckdb::Connection;
use tracing::debug;

use crate::WarehouseError;

/// The single connection slot owned by a [`crate::Warehouse`].
///
/// The slot starts empty. The first [`LazyConnection::acquire`] opens the
/// database file; every later call hands out the same live connection. There is
/// no transition back to the empty state while the value is alive.
pub struct LazyConnection {
    db_path: PathBuf,
    slot: Mutex<Option<Connection>>,
    opened: AtomicU64,
}

impl LazyConnection {
    /// Create an empty slot for the database at `db_path`. No I/O happens here.
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            slot: Mutex::new(None),
            opened: AtomicU64::new(0),
        }
    }

    /// Acquire the live connection, opening it when the slot is still empty.
    ///
    /// The returned handle holds the slot lock, so callers see exclusive use of
    /// the connection until the handle is dropped.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created or the
    /// database file cannot be opened or configured.
    pub fn acquire(&self) -> Result<ConnectionHandle<'_>, WarehouseError> {
        let mut slot = self.lock();
        if slot.is_none() {
            *slot = Some(open_connection(self.db_path.as_path())?);
            self.opened.fetch_add(1, Ordering::Relaxed);
            debug!(db_path = %self.db_path.display(), "opened duckdb connection");
        }
        Ok(ConnectionHandle { slot })
    }

    /// Whether the slot currently holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// How many times a connection was actually opened.
    pub fn opened_count(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.db_path.as_path()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Borrowed access to the live connection.
pub struct ConnectionHandle<'a> {
    slot: MutexGuard<'a, Option<Connection>>,
}

impl Deref for ConnectionHandle<'_> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.slot
            .as_ref()
            .expect("connection slot is filled before a handle is issued")
    }
}

/// Open a new database connection.
fn open_connection(path: &Path) -> Result<Connection, WarehouseError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    Ok(connection)
}
