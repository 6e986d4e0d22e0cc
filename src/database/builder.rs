//! # Connection Builder
//!
//! This module provides the `ConnectionBuilder` API for configuring and
//! opening turorm connections.
//!
//! ## Builder Pattern
//!
//! `ConnectionBuilder` uses the builder pattern to provide a fluent, type-safe
//! API for connection configuration. Settings can be chained together before
//! calling `open()`.
//!
//! ## Configuration Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | path | required (or `in_memory`) | database file |
//! | flags | `READ_WRITE \| CREATE \| URI \| NO_MUTEX` | engine open flags |
//! | key | none | passphrase or 32 raw bytes, applied with `pragma key` |
//! | store_timestamps_as_ticks | true | `NaiveDateTime` as ticks or ISO text |
//! | busy_timeout | 100 ms | wait on a locked database before `SQLITE_BUSY` |
//! | create_flags | `CreateFlags::NONE` | conventions for `create_table` and `mapping` |
//!
//! ## Usage Examples
//!
//! ```ignore
//! let conn = Connection::builder()
//!     .path("./app.db")
//!     .busy_timeout(Duration::from_secs(1))
//!     .create_flags(CreateFlags::ALL_IMPLICIT)
//!     .open()?;
//! ```
//!
//! ### Encrypted (requires the `sqlcipher` feature):
//!
//! ```ignore
//! let conn = Connection::builder()
//!     .path("./secret.db")
//!     .key("correct horse battery staple")
//!     .open()?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::OpenFlags;

use super::connection::Connection;
use crate::error::{OrmError, Result};
use crate::schema::CreateFlags;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(100);
pub const RAW_KEY_LEN: usize = 32;

/// Encryption key applied immediately after open.
#[derive(Clone, PartialEq, Eq)]
pub enum EncryptionKey {
    Passphrase(String),
    Raw(Vec<u8>),
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncryptionKey::Passphrase(_) => f.write_str("Passphrase(..)"),
            EncryptionKey::Raw(_) => f.write_str("Raw(..)"),
        }
    }
}

impl EncryptionKey {
    /// The `pragma key` statement for this key.
    pub(crate) fn pragma(&self) -> Result<String> {
        match self {
            EncryptionKey::Passphrase(passphrase) => {
                Ok(format!("pragma key = '{}'", passphrase.replace('\'', "''")))
            }
            EncryptionKey::Raw(bytes) => {
                if bytes.len() != RAW_KEY_LEN {
                    return Err(OrmError::Connection {
                        path: String::new(),
                        message: format!("raw key must be {} bytes, got {}", RAW_KEY_LEN, bytes.len()),
                    });
                }
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                Ok(format!("pragma key = \"x'{}'\"", hex))
            }
        }
    }
}

/// Builder for configuring and opening a turorm connection.
#[derive(Debug)]
pub struct ConnectionBuilder {
    path: Option<PathBuf>,
    flags: Option<OpenFlags>,
    key: Option<EncryptionKey>,
    store_timestamps_as_ticks: Option<bool>,
    busy_timeout: Option<Duration>,
    create_flags: Option<CreateFlags>,
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self {
            path: None,
            flags: None,
            key: None,
            store_timestamps_as_ticks: None,
            busy_timeout: None,
            create_flags: None,
        }
    }

    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Opens a private in-memory database.
    pub fn in_memory(mut self) -> Self {
        self.path = Some(PathBuf::from(":memory:"));
        self
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn key(mut self, passphrase: impl Into<String>) -> Self {
        self.key = Some(EncryptionKey::Passphrase(passphrase.into()));
        self
    }

    /// Raw 256-bit key, passed to the engine in `x'…'` form.
    pub fn raw_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(EncryptionKey::Raw(key.into()));
        self
    }

    pub fn store_timestamps_as_ticks(mut self, enabled: bool) -> Self {
        self.store_timestamps_as_ticks = Some(enabled);
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    pub fn create_flags(mut self, flags: CreateFlags) -> Self {
        self.create_flags = Some(flags);
        self
    }

    pub fn open(self) -> Result<Connection> {
        let path = self.path.ok_or_else(|| OrmError::Connection {
            path: String::new(),
            message: "no database path configured".into(),
        })?;

        Connection::open_configured(
            path,
            self.flags.unwrap_or_default(),
            self.key,
            self.store_timestamps_as_ticks.unwrap_or(true),
            self.busy_timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT),
            self.create_flags.unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_is_quoted() {
        let key = EncryptionKey::Passphrase("it's".into());
        assert_eq!(key.pragma().unwrap(), "pragma key = 'it''s'");
    }

    #[test]
    fn raw_key_uses_blob_literal() {
        let key = EncryptionKey::Raw(vec![0xab; RAW_KEY_LEN]);
        let pragma = key.pragma().unwrap();
        assert!(pragma.starts_with("pragma key = \"x'abab"));
        assert!(pragma.ends_with("'\""));
    }

    #[test]
    fn raw_key_must_be_32_bytes() {
        let key = EncryptionKey::Raw(vec![1, 2, 3]);
        assert!(matches!(key.pragma(), Err(OrmError::Connection { .. })));
    }

    #[test]
    fn open_without_path_fails() {
        let err = ConnectionBuilder::new().open().unwrap_err();
        assert!(matches!(err, OrmError::Connection { .. }));
    }
}
