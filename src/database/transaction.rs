//! # Transaction Management Module
//!
//! Nested transactions on top of the engine's `BEGIN` and `SAVEPOINT`.
//!
//! ## Depth
//!
//! The connection keeps an atomic transaction depth. Depth 0 means no engine
//! transaction is open; every path that opens, closes or unwinds a
//! transaction moves the depth with a single compare-exchange, swap, add or
//! store so the invariant `depth > 0 ⇔ transaction open` holds between calls.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Transaction Flow                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   begin_transaction ──────► CAS 0 → 1 ──────► "begin transaction"       │
//! │   save_transaction_point ─► depth += 1 ─────► "savepoint S<r>D<d>"      │
//! │   rollback_to(S<r>D<d>) ──► depth = d ──────► "rollback to" + "release" │
//! │   release(S<r>D<d>) ──────► depth = d ──────► "release S<r>D<d>"        │
//! │   rollback ───────────────► swap 0 ─────────► "rollback"                │
//! │   commit ─────────────────► swap 0 ─────────► "commit"                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Savepoint Tokens
//!
//! `save_transaction_point` returns `S<random>D<depth>`, where `depth` is the
//! depth before the savepoint was taken. `rollback_to` and `release` parse it
//! back and refuse tokens whose depth is not below the current one.
//!
//! ## Failure Recovery
//!
//! When `begin` or `savepoint` fails with IOERR, FULL, BUSY, NOMEM or
//! INTERRUPT the engine may already have rolled back, so the whole
//! transaction is rolled back quietly and the depth reset before the error is
//! returned. Any other failure only undoes the depth change. The same split
//! applies to `rollback to` and `release`: an engine failure on a token the
//! engine does not know (a stale savepoint) restores the depth it had. A
//! failed `commit` and a `rollback_to` whose trailing `release` fails also
//! roll back quietly.
//!
//! `run_in_transaction` is the one compensating wrapper: it rolls back to its
//! savepoint when the closure fails or panics.

use std::fmt;
use std::sync::atomic::Ordering;

use rand::Rng;
use tracing::{debug, warn};

use super::connection::Connection;
use crate::error::{OrmError, Result};

/// Token naming one savepoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Savepoint(String);

impl Savepoint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Transaction depth the savepoint returns to.
    pub fn depth(&self) -> Option<usize> {
        parse_depth(&self.0)
    }
}

impl AsRef<str> for Savepoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Depth encoded in a `S<random>D<depth>` token.
fn parse_depth(token: &str) -> Option<usize> {
    let rest = token.strip_prefix('S')?;
    let (random, depth) = rest.split_once('D')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(random) || !all_digits(depth) {
        return None;
    }
    depth.parse().ok()
}

impl Connection {
    pub fn is_in_transaction(&self) -> bool {
        self.transaction_depth() > 0
    }

    pub fn transaction_depth(&self) -> usize {
        self.transaction_depth.load(Ordering::Acquire)
    }

    pub fn begin_transaction(&self) -> Result<()> {
        if self
            .transaction_depth
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(OrmError::TransactionState(
                "cannot begin a transaction while already in a transaction".into(),
            ));
        }

        if let Err(err) = self.execute("begin transaction", &[]) {
            self.recover_failed_open(&err);
            return Err(err);
        }
        Ok(())
    }

    /// Opens a savepoint, beginning a transaction if none is open.
    pub fn save_transaction_point(&self) -> Result<Savepoint> {
        let depth = self.transaction_depth.fetch_add(1, Ordering::AcqRel);
        let random: u16 = rand::thread_rng().gen_range(0..i16::MAX as u16);
        let savepoint = Savepoint(format!("S{}D{}", random, depth));

        if let Err(err) = self.execute(&format!("savepoint {}", savepoint), &[]) {
            self.recover_failed_open(&err);
            return Err(err);
        }
        Ok(savepoint)
    }

    fn recover_failed_open(&self, err: &OrmError) {
        if err.is_transient() {
            self.rollback_quietly();
        } else {
            let _ = self
                .transaction_depth
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| d.checked_sub(1));
        }
    }

    /// Rolls back the whole transaction. A no-op when none is open.
    pub fn rollback(&self) -> Result<()> {
        if self.transaction_depth.swap(0, Ordering::AcqRel) > 0 {
            self.execute("rollback", &[])?;
        }
        Ok(())
    }

    /// Rolls back to `savepoint`; an empty token rolls back everything.
    pub fn rollback_to(&self, savepoint: impl AsRef<str>) -> Result<()> {
        let token = savepoint.as_ref();
        if token.is_empty() {
            return self.rollback();
        }
        self.savepoint_execute(token, "rollback to")?;
        if let Err(err) = self.execute(&format!("release {}", token), &[]) {
            self.force_rollback_quietly();
            return Err(err);
        }
        Ok(())
    }

    pub fn release(&self, savepoint: impl AsRef<str>) -> Result<()> {
        self.savepoint_execute(savepoint.as_ref(), "release")
    }

    pub fn commit(&self) -> Result<()> {
        if self.transaction_depth.swap(0, Ordering::AcqRel) != 0 {
            if let Err(err) = self.execute("commit", &[]) {
                self.force_rollback_quietly();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Runs `action` inside a savepoint: released on success, rolled back on
    /// error or panic.
    pub fn run_in_transaction<R>(&self, action: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let savepoint = self.save_transaction_point()?;
        let mut guard = RollbackGuard {
            conn: self,
            savepoint: &savepoint,
            armed: true,
        };
        let outcome = action(self);
        guard.armed = false;

        match outcome {
            Ok(value) => {
                self.release(&savepoint)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback_to(&savepoint) {
                    warn!(savepoint = %savepoint, error = %rollback_err, "rollback after failed transaction body failed");
                }
                Err(err)
            }
        }
    }

    fn savepoint_execute(&self, token: &str, verb: &str) -> Result<()> {
        let current = self.transaction_depth.load(Ordering::Acquire);
        let target = match parse_depth(token) {
            Some(depth) if depth < current => depth,
            _ => {
                return Err(OrmError::TransactionState(format!(
                    "savepoint '{}' is not valid, and should be the result of a call to save_transaction_point",
                    token
                )))
            }
        };

        self.transaction_depth
            .compare_exchange(current, target, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                OrmError::TransactionState(format!(
                    "transaction depth changed while applying savepoint '{}'",
                    token
                ))
            })?;
        if let Err(err) = self.execute(&format!("{} {}", verb, token), &[]) {
            if err.is_transient() {
                self.rollback_quietly();
            } else {
                let _ = self.transaction_depth.compare_exchange(
                    target,
                    current,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
            return Err(err);
        }
        Ok(())
    }

    fn rollback_quietly(&self) {
        if self.transaction_depth.swap(0, Ordering::AcqRel) > 0 {
            self.rollback_ignoring_errors();
        }
    }

    fn force_rollback_quietly(&self) {
        self.transaction_depth.store(0, Ordering::Release);
        self.rollback_ignoring_errors();
    }

    fn rollback_ignoring_errors(&self) {
        if let Err(err) = self.execute("rollback", &[]) {
            debug!(error = %err, "quiet rollback failed");
        }
    }
}

struct RollbackGuard<'a> {
    conn: &'a Connection,
    savepoint: &'a Savepoint,
    armed: bool,
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.conn.rollback_to(self.savepoint) {
                warn!(savepoint = %self.savepoint, error = %err, "rollback during unwind failed");
            }
        }
    }
}
