//! Application layer use cases for the gate service.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules, here in `gate-core`) and the infrastructure (MQTT,
//! files, HTTP).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a goal (e.g., "answer a badge
//!   check from the gate").
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so the infrastructure can be swapped without changing this code.
//! - **Contain no direct network I/O**.
//!
//! # Sub-modules
//!
//! - **`record_store`** – The authoritative badge table: one lock around the
//!   in-memory table, flushed to durable storage on every change.
//!
//! - **`dispatch`** – Opens an inbound frame, executes its command against the
//!   store, and seals the reply.  Runs once per inbound message.
//!
//! - **`status`** – The periodic status line (time, weather, free places),
//!   published independently of command traffic.
//!
//! - **`outbound`** – The publishing seam shared by `dispatch` and `status`.

pub mod dispatch;
pub mod outbound;
pub mod record_store;
pub mod status;
