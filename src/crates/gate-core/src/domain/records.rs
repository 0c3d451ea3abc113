//! The table of authorized badges.
//!
//! [`RecordTable`] maps each RFID UID to the name of its holder.  It keeps a
//! hash index for O(1) lookup plus the insertion order, so enumeration (and
//! therefore the persisted file) is deterministic.
//!
//! # Field rules
//!
//! Records end up in a comma-separated text file and in `;`-separated wire
//! replies, so the characters those formats use as delimiters are refused:
//!
//! | Field | Must be non-empty | Forbidden characters |
//! |-------|-------------------|----------------------|
//! | UID   | yes | `,` `;` `|` CR LF |
//! | name  | yes | `;` `|` CR LF |
//!
//! A name may contain commas: the file loader splits each row at its first
//! comma only.

use std::collections::HashMap;

use thiserror::Error;

const UID_FORBIDDEN: &[char] = &[',', ';', '|', '\r', '\n'];
const NAME_FORBIDDEN: &[char] = &[';', '|', '\r', '\n'];

/// Errors produced by [`RecordTable`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("UID {0:?} is already registered")]
    AlreadyExists(String),

    #[error("UID {0:?} is not registered")]
    NotFound(String),

    #[error("invalid UID {0:?}")]
    InvalidUid(String),

    #[error("invalid holder name {0:?}")]
    InvalidName(String),
}

/// One authorized badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub uid: String,
    pub holder_name: String,
}

impl Record {
    pub fn new(uid: impl Into<String>, holder_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            holder_name: holder_name.into(),
        }
    }
}

/// In-memory badge table with unique UIDs and stable insertion order.
///
/// # Examples
///
/// ```rust
/// use gate_core::RecordTable;
///
/// let mut table = RecordTable::new();
/// table.insert("AB12", "Alice").unwrap();
/// assert!(table.insert("AB12", "Mallory").is_err());
/// assert_eq!(table.lookup("AB12").unwrap().holder_name, "Alice");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTable {
    names: HashMap<String, String>,
    order: Vec<String>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from previously persisted records.
    ///
    /// # Errors
    ///
    /// Fails on the first record that is invalid or repeats a UID; a store
    /// file with duplicates has been tampered with and must not be loaded.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Result<Self, RecordError> {
        let mut table = Self::new();
        for record in records {
            table.insert(&record.uid, &record.holder_name)?;
        }
        Ok(table)
    }

    /// Number of records, used as the car park's occupancy count.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// # Errors
    ///
    /// Returns [`RecordError::NotFound`] if `uid` is not registered.
    pub fn lookup(&self, uid: &str) -> Result<Record, RecordError> {
        self.names
            .get(uid)
            .map(|name| Record::new(uid, name.clone()))
            .ok_or_else(|| RecordError::NotFound(uid.to_string()))
    }

    /// Adds a new record at the end of the table.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidUid`] / [`RecordError::InvalidName`] if a field
    ///   breaks the field rules.
    /// - [`RecordError::AlreadyExists`] if `uid` is already registered.
    pub fn insert(&mut self, uid: &str, holder_name: &str) -> Result<(), RecordError> {
        validate_uid(uid)?;
        validate_name(holder_name)?;
        if self.names.contains_key(uid) {
            return Err(RecordError::AlreadyExists(uid.to_string()));
        }
        self.names.insert(uid.to_string(), holder_name.to_string());
        self.order.push(uid.to_string());
        Ok(())
    }

    /// Removes a record and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NotFound`] if `uid` is not registered.
    pub fn delete(&mut self, uid: &str) -> Result<Record, RecordError> {
        let name = self
            .names
            .remove(uid)
            .ok_or_else(|| RecordError::NotFound(uid.to_string()))?;
        self.order.retain(|existing| existing != uid);
        Ok(Record::new(uid, name))
    }

    /// Replaces the holder name of an existing record, keeping its position.
    /// Returns the previous name.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidName`] if `new_name` breaks the field rules.
    /// - [`RecordError::NotFound`] if `uid` is not registered.
    pub fn rename(&mut self, uid: &str, new_name: &str) -> Result<String, RecordError> {
        validate_name(new_name)?;
        let slot = self
            .names
            .get_mut(uid)
            .ok_or_else(|| RecordError::NotFound(uid.to_string()))?;
        Ok(std::mem::replace(slot, new_name.to_string()))
    }

    /// All records in insertion order.
    pub fn records(&self) -> Vec<Record> {
        self.order
            .iter()
            .filter_map(|uid| self.names.get(uid).map(|name| Record::new(uid, name.clone())))
            .collect()
    }
}

/// Checks a UID against the field rules.
///
/// # Errors
///
/// Returns [`RecordError::InvalidUid`] when the UID is empty or contains a
/// delimiter.
pub fn validate_uid(uid: &str) -> Result<(), RecordError> {
    if uid.is_empty() || uid.contains(UID_FORBIDDEN) {
        return Err(RecordError::InvalidUid(uid.to_string()));
    }
    Ok(())
}

/// Checks a holder name against the field rules.
///
/// # Errors
///
/// Returns [`RecordError::InvalidName`] when the name is empty or contains a
/// delimiter.
pub fn validate_name(name: &str) -> Result<(), RecordError> {
    if name.is_empty() || name.contains(NAME_FORBIDDEN) {
        return Err(RecordError::InvalidName(name.to_string()));
    }
    Ok(())
}
