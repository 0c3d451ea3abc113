//! gate-client library entry point.
//!
//! Emulates the RFID reader at the car park barrier.  The firmware's
//! transaction is reproduced step by step:
//!
//! 1. append `;C=<counter>;S=<session>` to the command,
//! 2. sign and encrypt it under a fresh random nonce,
//! 3. publish `IV=<nonce>|<hex>` on the command topic,
//! 4. wait (3 s by default) for a reply that authenticates under the same
//!    nonce, ignoring anything else on the response topic.
//!
//! - **`session`** – the pure part: counters, sealing, reply checking.
//! - **`link`** – the MQTT part: connecting, publishing, and waiting.

pub mod link;
pub mod session;

pub use link::{EdgeLink, LinkError, LinkSettings};
pub use session::{EdgeSession, PendingRequest, ResponseError};
