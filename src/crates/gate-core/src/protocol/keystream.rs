//! Per-message keystream derivation.
//!
//! # How the mask is built (for beginners)
//!
//! Both parties hold the same secret but never exchange a key stream.
//! Instead, the sender picks a number (the *nonce*, written `IV` on the wire)
//! and both sides compute:
//!
//! ```text
//! mask = HMAC-SHA256(key = shared_secret, message = "IV_SEED:" + decimal(nonce))
//! ```
//!
//! The 32-byte result is XORed over the plaintext, repeating from the start
//! when the plaintext is longer than 32 bytes.  Because the computation is
//! deterministic, the receiver obtains the same mask from the nonce alone.
//!
//! Reusing a nonce reuses the mask.  The protocol accepts this; see
//! [`crate::protocol::replay`] for the opt-in countermeasure.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::protocol::cipher::CipherError;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of one derived mask (the SHA-256 output size).
pub const MASK_LEN: usize = 32;

/// Prefix of the string that is hashed to derive a mask.
pub const SEED_PREFIX: &str = "IV_SEED:";

/// The pre-shared secret known to the service and every edge device.
///
/// The `Debug` output is redacted so the secret never reaches a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret(<{} bytes redacted>)", self.0.len())
    }
}

impl From<&str> for SharedSecret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

/// A 32-byte XOR mask derived from one nonce.
#[derive(Clone, PartialEq, Eq)]
pub struct Mask([u8; MASK_LEN]);

impl Mask {
    pub fn as_bytes(&self) -> &[u8; MASK_LEN] {
        &self.0
    }

    /// XORs `data` in place, cycling the mask over inputs longer than
    /// [`MASK_LEN`].  Applying the same mask twice restores the input.
    pub fn apply(&self, data: &mut [u8]) {
        for (byte, key) in data.iter_mut().zip(self.0.iter().cycle()) {
            *byte ^= key;
        }
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Mask(<redacted>)")
    }
}

/// Derives the mask for `nonce` under `secret`.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKey`] if the keyed hash refuses the secret.
/// HMAC accepts keys of any length, so this is not expected in practice.
///
/// # Examples
///
/// ```rust
/// use gate_core::protocol::keystream::{derive_mask, SharedSecret};
///
/// let secret = SharedSecret::from("K");
/// let a = derive_mask(&secret, 7).unwrap();
/// let b = derive_mask(&secret, 7).unwrap();
/// assert_eq!(a, b);
/// assert_ne!(a, derive_mask(&secret, 8).unwrap());
/// ```
pub fn derive_mask(secret: &SharedSecret, nonce: u64) -> Result<Mask, CipherError> {
    let mut mac = keyed_hash(secret)?;
    mac.update(SEED_PREFIX.as_bytes());
    mac.update(nonce.to_string().as_bytes());

    let digest = mac.finalize().into_bytes();
    let mut mask = [0u8; MASK_LEN];
    mask.copy_from_slice(&digest);
    Ok(Mask(mask))
}

pub(crate) fn keyed_hash(secret: &SharedSecret) -> Result<HmacSha256, CipherError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| CipherError::InvalidKey)
}
