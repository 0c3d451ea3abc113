//! The authoritative badge store.
//!
//! [`RecordStore`] wraps a [`RecordTable`] in a single `std::sync::Mutex`
//! and flushes the whole table to a [`RecordPersistence`] backend on every
//! mutation.  The lock is held for the full operation, including the file
//! rewrite, so no caller ever observes a state that is not also on disk.
//!
//! # Why a synchronous mutex? (for beginners)
//!
//! Store operations never `.await`: they touch memory and a local file.
//! Async callers run them through `tokio::task::spawn_blocking`, which keeps
//! the blocking file write off the async worker threads.  A plain
//! `std::sync::Mutex` is the right tool when the lock is never held across
//! an `.await` point.
//!
//! # Rollback
//!
//! A mutation first applies to a copy of the table, then persists the copy.
//! Only when the save succeeds does the copy replace the live table; a
//! failed save leaves memory exactly as it was before the call.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use gate_core::{Record, RecordError, RecordTable};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error raised by a durable storage backend.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error accessing records at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record file {path} at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// Error returned by [`RecordStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("failed to persist records: {0}")]
    Persist(#[from] PersistError),
}

/// Durable storage for the full record table.
///
/// Implementations rewrite everything on `save`; the table is small (one row
/// per car park badge) and the simplicity buys crash consistency.
pub trait RecordPersistence: Send + Sync {
    /// Reads every record in stored order.
    fn load(&self) -> Result<Vec<Record>, PersistError>;

    /// Replaces the stored table with `records`.
    fn save(&self, records: &[Record]) -> Result<(), PersistError>;
}

impl<T: RecordPersistence + ?Sized> RecordPersistence for std::sync::Arc<T> {
    fn load(&self) -> Result<Vec<Record>, PersistError> {
        (**self).load()
    }

    fn save(&self, records: &[Record]) -> Result<(), PersistError> {
        (**self).save(records)
    }
}

/// Thread-safe badge store backed by durable persistence.
pub struct RecordStore {
    table: Mutex<RecordTable>,
    persistence: Box<dyn RecordPersistence>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("RecordStore");
        match self.table.try_lock() {
            Ok(table) => out.field("count", &table.len()),
            Err(_) => out.field("count", &"<locked>"),
        };
        out.finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Loads the table from `persistence` and takes ownership of it.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Persist`] if the backend cannot be read.
    /// - [`StoreError::Record`] if the stored rows violate the table rules
    ///   (duplicate UID, delimiter characters).
    pub fn open(persistence: Box<dyn RecordPersistence>) -> Result<Self, StoreError> {
        let records = persistence.load()?;
        let table = RecordTable::from_records(records)?;
        info!(count = table.len(), "record store loaded");
        Ok(Self {
            table: Mutex::new(table),
            persistence,
        })
    }

    /// # Errors
    ///
    /// Returns [`RecordError::NotFound`] (wrapped) if `uid` is unknown.
    pub fn lookup(&self, uid: &str) -> Result<Record, StoreError> {
        Ok(self.lock().lookup(uid)?)
    }

    /// Adds a record and persists the table.
    ///
    /// # Errors
    ///
    /// [`RecordError::AlreadyExists`], an invalid field, or
    /// [`StoreError::Persist`] (the insert is rolled back).
    pub fn insert(&self, uid: &str, holder_name: &str) -> Result<(), StoreError> {
        self.mutate(|table| table.insert(uid, holder_name))?;
        debug!(uid, "record inserted");
        Ok(())
    }

    /// Removes a record and persists the table.
    pub fn delete(&self, uid: &str) -> Result<Record, StoreError> {
        let removed = self.mutate(|table| table.delete(uid))?;
        debug!(uid, "record deleted");
        Ok(removed)
    }

    /// Renames a record's holder and persists the table.  Returns the
    /// previous name.
    pub fn rename(&self, uid: &str, new_name: &str) -> Result<String, StoreError> {
        let previous = self.mutate(|table| table.rename(uid, new_name))?;
        debug!(uid, "record renamed");
        Ok(previous)
    }

    /// Current number of records (the occupancy count).
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Snapshot of all records in insertion order.
    pub fn records(&self) -> Vec<Record> {
        self.lock().records()
    }

    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut RecordTable) -> Result<T, RecordError>,
    ) -> Result<T, StoreError> {
        let mut table = self.lock();
        let mut staged = table.clone();
        let outcome = op(&mut staged)?;
        if let Err(e) = self.persistence.save(&staged.records()) {
            warn!(error = %e, "persisting records failed; change rolled back");
            return Err(e.into());
        }
        *table = staged;
        Ok(outcome)
    }

    // A panic while holding the lock cannot leave the table half-mutated
    // (changes are staged on a copy), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, RecordTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
