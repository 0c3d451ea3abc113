//! # gate-core
//!
//! Shared library for the parking gate access service containing the frame
//! protocol, the command grammar, and the in-memory record table.
//!
//! This crate is used by both the central service (`gate-server`) and the
//! edge-device emulator (`gate-client`).  It has zero dependencies on
//! network sockets, files, or an async runtime.
//!
//! # Architecture overview (for beginners)
//!
//! A badge reader at the parking gate (the "edge device") reads an RFID UID
//! and asks the central service whether that UID may enter.  Operators can
//! also add, remove, and rename authorizations from the same device.  Every
//! request and reply travels over an untrusted publish/subscribe broker, so
//! each message is individually encrypted and authenticated.
//!
//! This crate (`gate-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How text travels over the broker.  A command such as
//!   `CHECK;AB12` is signed with HMAC-SHA256, XOR-masked with a keystream
//!   derived from a per-message nonce, hex-encoded, and framed as
//!   `IV=<nonce>|<hex>`.
//!
//! - **`domain`** – Pure business rules with no I/O.  The `RecordTable` maps
//!   each UID to its holder's name and enforces UID uniqueness.

pub mod domain;
pub mod protocol;

pub use domain::records::{Record, RecordError, RecordTable};
pub use protocol::cipher::{CipherError, FrameCipher};
pub use protocol::command::{Command, CommandError, Reply};
pub use protocol::envelope::{OpenError, OpenedRequest};
pub use protocol::frame::{Frame, FrameError};
pub use protocol::keystream::SharedSecret;
pub use protocol::replay::NonceWindow;
