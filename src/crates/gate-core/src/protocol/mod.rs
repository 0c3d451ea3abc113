//! Protocol module containing the keystream, frame cipher, wire grammar, and
//! command/reply types.
//!
//! Layering, innermost first:
//!
//! ```text
//! keystream   HMAC-SHA256("IV_SEED:<nonce>") -> 32-byte mask
//! cipher      XOR with mask + hex, HMAC sign/verify
//! frame       IV=<nonce>|<hex> outer grammar
//! envelope    <payload>|<signature> inner grammar, open/seal helpers
//! command     CHECK / ADD / DEL / EDIT and their replies
//! ```

pub mod cipher;
pub mod command;
pub mod envelope;
pub mod frame;
pub mod keystream;
pub mod replay;

pub use cipher::{CipherError, FrameCipher};
pub use command::{Command, CommandError, Reply};
pub use envelope::{OpenError, OpenedRequest};
pub use frame::{Frame, FrameError};
pub use keystream::{derive_mask, Mask, SharedSecret, MASK_LEN};
pub use replay::NonceWindow;
