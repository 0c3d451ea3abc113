//! In-memory record persistence for tests.
//!
//! Behaves like the record file but keeps the rows in a `Mutex<Vec<_>>`.
//! Saves can be made to fail on demand or to take a fixed time, which lets
//! tests exercise rollback and lock contention.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use gate_core::Record;

use crate::application::record_store::{PersistError, RecordPersistence};

/// A [`RecordPersistence`] that never touches the file system.
#[derive(Debug, Default)]
pub struct MemoryRecordFile {
    rows: Mutex<Vec<Record>>,
    fail_saves: AtomicBool,
    save_count: AtomicUsize,
    save_delay: Option<Duration>,
}

impl MemoryRecordFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `records` already "on disk".
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            rows: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Makes every save sleep for `delay` before completing.
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = Some(delay);
        self
    }

    /// When `true`, subsequent saves fail with an I/O error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// The rows as last saved.
    pub fn snapshot(&self) -> Vec<Record> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordPersistence for MemoryRecordFile {
    fn load(&self) -> Result<Vec<Record>, PersistError> {
        Ok(self.snapshot())
    }

    fn save(&self, records: &[Record]) -> Result<(), PersistError> {
        if let Some(delay) = self.save_delay {
            std::thread::sleep(delay);
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated save failure"),
            });
        }
        *self.rows.lock().unwrap_or_else(PoisonError::into_inner) = records.to_vec();
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load_returns_rows() {
        let file = MemoryRecordFile::new();
        file.save(&[Record::new("A", "Alice")]).unwrap();
        assert_eq!(file.load().unwrap(), vec![Record::new("A", "Alice")]);
        assert_eq!(file.save_count(), 1);
    }

    #[test]
    fn test_failing_save_keeps_previous_rows() {
        let file = MemoryRecordFile::with_records(vec![Record::new("A", "Alice")]);
        file.fail_saves(true);
        assert!(file.save(&[]).is_err());
        assert_eq!(file.snapshot().len(), 1);
        assert_eq!(file.save_count(), 0);
    }
}
