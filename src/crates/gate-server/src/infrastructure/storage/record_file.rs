//! The badge table as a comma-separated text file.
//!
//! ```text
//! UID,NAME
//! 04A1B2C3,Jeanne Martin
//! 0E7AB005,Admin
//! ```
//!
//! Loading skips the header (any first line starting with `UID,`, so files
//! written with the older `UID,NOM` header still load), ignores blank lines,
//! trims a trailing CR, and splits each row at its first comma so names may
//! contain commas.  A name wrapped in double quotes, as written by
//! spreadsheet tools, is unquoted.  Saving quotes any name that itself
//! starts with a double quote, so such names survive a reload unchanged.
//!
//! Saving writes the whole table to a sibling `.tmp` file, syncs it, then
//! renames it over the original.  A crash mid-save leaves either the old or
//! the new file, never a truncated one.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use gate_core::Record;
use tracing::{debug, info};

use crate::application::record_store::{PersistError, RecordPersistence};

/// Header line written at the top of every record file.
pub const HEADER: &str = "UID,NAME";
const HEADER_PREFIX: &str = "UID,";

/// [`RecordPersistence`] backed by a text file.
#[derive(Debug, Clone)]
pub struct CsvRecordFile {
    path: PathBuf,
}

impl CsvRecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError {
    let path = path.to_path_buf();
    move |source| PersistError::Io { path, source }
}

impl RecordPersistence for CsvRecordFile {
    fn load(&self) -> Result<Vec<Record>, PersistError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => parse_table(&self.path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "record file missing; creating an empty one");
                self.save(&[])?;
                Ok(Vec::new())
            }
            Err(e) => Err(io_error(&self.path)(e)),
        }
    }

    fn save(&self, records: &[Record]) -> Result<(), PersistError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_error(dir))?;
        }

        let temp = self.temp_path();
        let mut file = File::create(&temp).map_err(io_error(&temp))?;
        file.write_all(render_table(records).as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(io_error(&temp))?;
        drop(file);
        fs::rename(&temp, &self.path).map_err(io_error(&self.path))?;

        debug!(path = %self.path.display(), count = records.len(), "record file written");
        Ok(())
    }
}

/// Parses file content into records.  `path` is used for error messages.
///
/// # Errors
///
/// Returns [`PersistError::Corrupt`] for a non-blank row without a comma.
pub fn parse_table(path: &Path, content: &str) -> Result<Vec<Record>, PersistError> {
    let mut records = Vec::new();
    for (index, raw) in content.split('\n').enumerate() {
        let line = raw.trim_end_matches('\r');
        if index == 0 && line.starts_with(HEADER_PREFIX) {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let (uid, name) = line.split_once(',').ok_or_else(|| PersistError::Corrupt {
            path: path.to_path_buf(),
            line: index + 1,
            reason: "expected `uid,name`".to_string(),
        })?;
        records.push(Record::new(uid, unquote(name)));
    }
    Ok(records)
}

/// Renders records as file content, header included.
pub fn render_table(records: &[Record]) -> String {
    let mut out = String::with_capacity(HEADER.len() + 1 + records.len() * 24);
    out.push_str(HEADER);
    out.push('\n');
    for record in records {
        out.push_str(&record.uid);
        out.push(',');
        out.push_str(&quote_if_needed(&record.holder_name));
        out.push('\n');
    }
    out
}

// A raw name starting with `"` would be unquoted on the next load.
fn quote_if_needed(name: &str) -> Cow<'_, str> {
    if name.starts_with('"') {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(name)
    }
}

fn unquote(field: &str) -> String {
    match field
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => field.to_string(),
    }
}
