//! Domain entities for the parking gate.
//!
//! This module contains pure business rules with no infrastructure
//! dependencies: no files, no locks, no network.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the service holds the rules that make it what it
//! is.  Here that is a single concept: the table of authorized badges, in
//! which every UID appears at most once.  Locking, durable storage, and the
//! transport live in `gate-server` and depend on this module, never the
//! other way round, so the rules can be unit-tested in isolation.

/// Authorized badge records.
///
/// See [`records::RecordTable`] for the main type.
pub mod records;
