//! # Connection
//!
//! `Connection` owns the engine handle and every per-connection cache:
//!
//! ```text
//! Connection
//! ├── handle              rusqlite::Connection (None once closed)
//! ├── transaction_depth   AtomicUsize, > 0 ⇔ engine transaction open
//! ├── catalog             MappingCatalog (TypeId → Arc<TableMapping>)
//! ├── created_tables      TypeIds whose table was created/migrated
//! └── insert_commands     PreparedInsertCache (TypeId → cached insert SQL)
//! ```
//!
//! ## Lifecycle
//!
//! `close` sweeps the insert cache, flushes rusqlite's prepared statement
//! cache, clears the mapping caches and closes the handle. It is idempotent
//! and runs from `Drop`. Commands and deferred queries borrow the connection,
//! so none can outlive it.
//!
//! ## Encryption
//!
//! A key is applied with `pragma key` before any other statement, then
//! checked: `pragma cipher_version` must report a cipher and the schema must
//! be readable. A build without the `sqlcipher` feature therefore refuses
//! keyed opens instead of writing plaintext.
//!
//! ## Thread Safety
//!
//! `Connection` is `Send` but not `Sync`. Share one across threads as
//! `Arc<Mutex<Connection>>`, or open one per worker.

use std::any::TypeId;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashSet;
use parking_lot::Mutex;
use rusqlite::{ffi, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use super::builder::{ConnectionBuilder, EncryptionKey};
use super::command::{Command, DeferredQuery};
use super::prepared::PreparedInsertCache;
use super::row::Row;
use crate::error::{OrmError, Result};
use crate::schema::{CreateFlags, MappingCatalog, Record, TableMapping};
use crate::sql::TableQuery;
use crate::types::{FieldType, OwnedValue};

pub struct Connection {
    handle: Option<rusqlite::Connection>,
    path: PathBuf,
    store_timestamps_as_ticks: bool,
    create_flags: CreateFlags,
    busy_timeout: Cell<Duration>,
    pub(crate) transaction_depth: AtomicUsize,
    catalog: MappingCatalog,
    pub(crate) created_tables: Mutex<HashSet<TypeId>>,
    pub(crate) insert_commands: PreparedInsertCache,
}

impl Connection {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Opens (creating if needed) the database at `path` with default settings.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ConnectionBuilder::new().path(path).open()
    }

    pub fn open_in_memory() -> Result<Self> {
        ConnectionBuilder::new().in_memory().open()
    }

    pub(crate) fn open_configured(
        path: PathBuf,
        flags: OpenFlags,
        key: Option<EncryptionKey>,
        store_timestamps_as_ticks: bool,
        busy_timeout: Duration,
        create_flags: CreateFlags,
    ) -> Result<Self> {
        let path_text = path.display().to_string();
        let connection_error = |message: String| OrmError::Connection {
            path: path_text.clone(),
            message,
        };

        let handle = rusqlite::Connection::open_with_flags(&path, flags)
            .map_err(|e| connection_error(e.to_string()))?;

        if let Some(key) = &key {
            apply_key(&handle, key).map_err(connection_error)?;
        }

        handle
            .busy_timeout(busy_timeout)
            .map_err(|e| connection_error(format!("could not set busy timeout: {}", e)))?;

        info!(path = %path.display(), encrypted = key.is_some(), "opened connection");

        Ok(Self {
            handle: Some(handle),
            path,
            store_timestamps_as_ticks,
            create_flags,
            busy_timeout: Cell::new(busy_timeout),
            transaction_depth: AtomicUsize::new(0),
            catalog: MappingCatalog::new(),
            created_tables: Mutex::new(HashSet::new()),
            insert_commands: PreparedInsertCache::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn store_timestamps_as_ticks(&self) -> bool {
        self.store_timestamps_as_ticks
    }

    pub fn create_flags(&self) -> CreateFlags {
        self.create_flags
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout.get()
    }

    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.handle()?.busy_timeout(timeout)?;
        self.busy_timeout.set(timeout);
        Ok(())
    }

    pub(crate) fn handle(&self) -> Result<&rusqlite::Connection> {
        self.handle.as_ref().ok_or_else(|| OrmError::Execution {
            code: ffi::SQLITE_MISUSE,
            message: format!("connection to {} is closed", self.path.display()),
        })
    }

    pub(crate) fn trace(&self, sql: &str) {
        debug!(target: "turorm::sql", sql = %sql, "executing");
    }

    /// Rows changed by the most recent statement.
    pub fn changes(&self) -> usize {
        self.handle.as_ref().map(|h| h.changes() as usize).unwrap_or(0)
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.handle.as_ref().map(|h| h.last_insert_rowid()).unwrap_or(0)
    }

    /// Mapping for `T`, built with the connection's create flags on first use.
    pub fn mapping<T: Record>(&self) -> Result<Arc<TableMapping>> {
        self.catalog.get_mapping::<T>(self.create_flags)
    }

    /// Mapping for `T`; `flags` only apply if `T` has not been mapped yet.
    pub fn mapping_with<T: Record>(&self, flags: CreateFlags) -> Result<Arc<TableMapping>> {
        self.catalog.get_mapping::<T>(flags)
    }

    pub fn table_mappings(&self) -> Vec<Arc<TableMapping>> {
        self.catalog.mappings()
    }

    /// True once `create_table` has run for `T` on this connection.
    pub fn is_table_created<T: Record>(&self) -> bool {
        self.created_tables.lock().contains(&TypeId::of::<T>())
    }

    pub fn create_command(&self, sql: impl Into<String>) -> Command<'_> {
        Command::new(self, sql)
    }

    pub fn table<T: Record>(&self) -> Result<TableQuery<'_, T>> {
        Ok(TableQuery::new(self, self.mapping::<T>()?))
    }

    pub fn execute(&self, sql: &str, params: &[OwnedValue]) -> Result<usize> {
        self.create_command(sql).bind_all(params).execute_non_query()
    }

    pub fn execute_scalar<V: FieldType>(&self, sql: &str, params: &[OwnedValue]) -> Result<V> {
        self.create_command(sql).bind_all(params).execute_scalar()
    }

    pub fn query<T: Record>(&self, sql: &str, params: &[OwnedValue]) -> Result<Vec<T>> {
        self.create_command(sql).bind_all(params).execute_query()
    }

    pub fn deferred_query<T: Record>(&self, sql: &str, params: &[OwnedValue]) -> Result<DeferredQuery<'_, T>> {
        self.create_command(sql).bind_all(params).execute_deferred_query()
    }

    pub fn query_rows(&self, sql: &str, params: &[OwnedValue]) -> Result<Vec<Row>> {
        self.create_command(sql).bind_all(params).execute_rows()
    }

    /// Drops cached statements and closes the engine handle.
    pub fn close(&mut self) -> Result<()> {
        self.close_handle(false)
    }

    fn close_handle(&mut self, dropping: bool) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let swept = self.insert_commands.clear();
        handle.flush_prepared_statement_cache();
        debug!(path = %self.path.display(), swept, "swept cached insert statements");
        self.catalog.clear();
        self.created_tables.lock().clear();
        self.transaction_depth.store(0, Ordering::Release);

        match handle.close() {
            Ok(()) => {
                info!(path = %self.path.display(), "closed connection");
                Ok(())
            }
            Err((handle, err)) => {
                if dropping {
                    warn!(path = %self.path.display(), error = %err, "leaking connection that failed to close");
                    std::mem::forget(handle);
                } else {
                    self.handle = Some(handle);
                }
                Err(OrmError::Connection {
                    path: self.path.display().to_string(),
                    message: format!("could not close: {}", err),
                })
            }
        }
    }
}

/// Applies `key` and checks that the engine actually encrypts.
fn apply_key(handle: &rusqlite::Connection, key: &EncryptionKey) -> std::result::Result<(), String> {
    let pragma = key.pragma().map_err(|e| e.to_string())?;
    handle
        .execute_batch(&pragma)
        .map_err(|e| format!("could not apply key: {}", e))?;

    let cipher: Option<String> = handle
        .query_row("pragma cipher_version", [], |row| row.get(0))
        .optional()
        .map_err(|e| format!("could not query cipher version: {}", e))?;
    if cipher.is_none() {
        return Err("encryption is not available: the engine was built without a cipher \
                    (enable the `sqlcipher` feature)"
            .into());
    }

    handle
        .query_row("select count(*) from sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(|e| format!("key rejected: {}", e))?;
    Ok(())
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close_handle(true) {
            warn!(error = %err, "error while dropping connection");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("transaction_depth", &self.transaction_depth.load(Ordering::Relaxed))
            .field("store_timestamps_as_ticks", &self.store_timestamps_as_ticks)
            .finish_non_exhaustive()
    }
}
