//! Storage infrastructure: files on disk.
//!
//! - `config` reads the TOML service configuration and applies environment
//!   overrides.
//! - `record_file` persists the badge table as a small comma-separated text
//!   file, rewritten atomically on every change.
//! - `memory` is an in-memory [`RecordPersistence`] for tests.
//!
//! [`RecordPersistence`]: crate::application::record_store::RecordPersistence

pub mod config;
pub mod memory;
pub mod record_file;
