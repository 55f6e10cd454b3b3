//! Dual reader/writer connection manager with retrying write-lock
//! acquisition (spec §4.1 "storage manager").
//!
//! One writer `Mutex<Connection>` and one reader `Mutex<Connection>`
//! sit side by side for in-process concurrency. That covers contention
//! between callers in the same process, but this store also has to
//! survive contention *across* processes (the CLI and a detached dream
//! worker sharing one database file): opening the writer connection is
//! retried with exponential backoff before giving up.

use crate::error::{MnemoError, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Default retry budget for acquiring the writer connection.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Initial delay between retries; multiplied by 1.5 after each failed attempt.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Owns the two SQLite connections backing the store.
pub struct Manager {
    path: PathBuf,
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    max_retries: u32,
    retry_delay: Duration,
}

impl Manager {
    /// Open (creating and migrating if necessary) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_retry(path, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS)
    }

    pub fn open_with_retry(path: &Path, max_retries: u32, retry_delay_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            harden_dir_permissions(parent);
        }

        let writer_conn = Self::acquire_writer(path, max_retries, retry_delay_ms)?;
        configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;
        harden_file_permissions(path);

        let reader_conn = Connection::open(path)?;
        configure_connection(&reader_conn)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            max_retries,
            retry_delay: Duration::from_millis(retry_delay_ms),
        })
    }

    /// Open an in-memory database, for tests. Uses a named shared-cache
    /// URI so the writer and reader connections see the same database —
    /// two plain `:memory:` connections would each get their own.
    pub fn open_in_memory() -> Result<Self> {
        let uri = format!("file:mnemo-mem-{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;

        let writer_conn = Connection::open_with_flags(&uri, flags)?;
        configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open_with_flags(&uri, flags)?;
        configure_connection(&reader_conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop and reacquire the writer connection, applying the same retry
    /// budget `open_with_retry` used. The dream worker calls this if a scan
    /// finds the writer connection has gone stale (e.g. the file was
    /// replaced out from under it).
    pub fn reopen_writer(&self) -> Result<()> {
        let new_conn = Self::acquire_writer(
            &self.path,
            self.max_retries,
            self.retry_delay.as_millis() as u64,
        )?;
        configure_connection(&new_conn)?;
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| MnemoError::LockTimeout { attempts: 0 })?;
        *guard = new_conn;
        Ok(())
    }

    /// Run `f` against the writer connection, serialized with other writers
    /// in this process via the mutex. Cross-process contention was already
    /// resolved at `open_with_retry` time; SQLite's own `busy_timeout`
    /// PRAGMA absorbs transient lock collisions after that.
    pub fn with_writer<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .writer
            .lock()
            .map_err(|_| MnemoError::LockTimeout { attempts: 0 })?;
        f(&guard)
    }

    /// Run `f` against the reader connection.
    pub fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .reader
            .lock()
            .map_err(|_| MnemoError::LockTimeout { attempts: 0 })?;
        f(&guard)
    }

    /// Acquire the writer connection with exponential backoff, mirroring
    /// `SmartDatabaseManager.get_write_connection`'s retry loop.
    fn acquire_writer(path: &Path, max_retries: u32, retry_delay_ms: u64) -> Result<Connection> {
        let mut delay = Duration::from_millis(retry_delay_ms);
        let mut last_err = None;

        for attempt in 0..max_retries.max(1) {
            match Connection::open(path) {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < max_retries {
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries,
                            ?delay,
                            "failed to acquire write lock, retrying"
                        );
                        std::thread::sleep(delay);
                        delay = delay.mul_f64(1.5);
                    }
                }
            }
        }

        match last_err {
            Some(e) => Err(MnemoError::Storage(e)),
            None => Err(MnemoError::LockTimeout {
                attempts: max_retries,
            }),
        }
    }
}

/// Apply the same PRAGMA set to both connections: WAL journaling for
/// reader/writer concurrency, a busy timeout so transient lock contention
/// resolves without surfacing as an error, and foreign keys enforced so
/// deleting a memory cascades through its tags and links.
fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA temp_store = MEMORY;",
    )?;
    Ok(())
}

#[cfg(unix)]
fn harden_dir_permissions(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o700);
    let _ = std::fs::set_permissions(dir, perms);
}

#[cfg(not(unix))]
fn harden_dir_permissions(_dir: &Path) {}

#[cfg(unix)]
fn harden_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if path.exists() {
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn harden_file_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_applies_migrations() {
        let manager = Manager::open_in_memory().unwrap();
        let version = manager
            .with_reader(|conn| Ok(super::super::migrations::get_current_version(conn)?))
            .unwrap();
        assert_eq!(version, super::super::migrations::MIGRATIONS.last().unwrap().version);
    }

    #[test]
    fn writer_and_reader_see_the_same_data() {
        let manager = Manager::open_in_memory().unwrap();
        manager
            .with_writer(|conn| {
                conn.execute(
                    "INSERT INTO contexts (id, name, created_at) VALUES ('c1', 'demo', datetime('now'))",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let count: i64 = manager
            .with_reader(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM contexts", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
