//! XOR-keystream encryption and HMAC authentication of frame payloads.
//!
//! [`FrameCipher`] owns the shared secret and offers the four primitives the
//! rest of the protocol is built from:
//!
//! | Operation | Output |
//! |-----------|--------|
//! | `encrypt(plaintext, nonce)` | lowercase hex of `utf8(plaintext) XOR mask(nonce)` |
//! | `decrypt(hex, nonce)` | the original text |
//! | `sign(payload)` | lowercase hex HMAC-SHA256 of the payload |
//! | `verify(payload, hex)` | constant-time comparison against `sign(payload)` |
//!
//! `verify` never uses `==` on digests: an ordinary comparison stops at the
//! first differing byte, which lets an attacker learn a valid signature one
//! byte at a time by measuring response latency.

use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::protocol::keystream::{derive_mask, keyed_hash, SharedSecret};

/// Errors raised while encrypting, decrypting, or signing.
#[derive(Debug, Error, PartialEq)]
pub enum CipherError {
    /// The keyed hash could not be initialised with the shared secret.
    #[error("shared secret rejected by the keyed hash")]
    InvalidKey,

    /// The ciphertext is not a valid hex string.
    #[error("malformed hex ciphertext: {0}")]
    MalformedHex(#[from] hex::FromHexError),

    /// The unmasked bytes are not valid UTF-8 text.
    #[error("decrypted bytes are not valid UTF-8")]
    NotUtf8,
}

/// Encrypts, decrypts, signs, and verifies under one shared secret.
///
/// Cloning is cheap enough to hand one copy to each task.
///
/// # Examples
///
/// ```rust
/// use gate_core::{FrameCipher, SharedSecret};
///
/// let cipher = FrameCipher::new(SharedSecret::from("K"));
/// let hex = cipher.encrypt("CHECK;AB12", 7).unwrap();
/// assert_eq!(cipher.decrypt(&hex, 7).unwrap(), "CHECK;AB12");
///
/// let sig = cipher.sign("CHECK;AB12").unwrap();
/// assert!(cipher.verify("CHECK;AB12", &sig));
/// assert!(!cipher.verify("CHECK;AB13", &sig));
/// ```
#[derive(Debug, Clone)]
pub struct FrameCipher {
    secret: SharedSecret,
}

impl FrameCipher {
    pub fn new(secret: SharedSecret) -> Self {
        Self { secret }
    }

    /// Masks the UTF-8 bytes of `plaintext` with the keystream for `nonce`
    /// and returns them as lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKey`] if the mask cannot be derived.
    pub fn encrypt(&self, plaintext: &str, nonce: u64) -> Result<String, CipherError> {
        let mask = derive_mask(&self.secret, nonce)?;
        let mut bytes = plaintext.as_bytes().to_vec();
        mask.apply(&mut bytes);
        Ok(hex::encode(bytes))
    }

    /// Reverses [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// - [`CipherError::MalformedHex`] for odd-length or non-hex input.
    /// - [`CipherError::NotUtf8`] when the unmasked bytes are not text, which
    ///   is what a wrong nonce or wrong secret usually produces.
    pub fn decrypt(&self, ciphertext_hex: &str, nonce: u64) -> Result<String, CipherError> {
        let mut bytes = hex::decode(ciphertext_hex)?;
        let mask = derive_mask(&self.secret, nonce)?;
        mask.apply(&mut bytes);
        String::from_utf8(bytes).map_err(|_| CipherError::NotUtf8)
    }

    /// Returns the lowercase hex HMAC-SHA256 of `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKey`] if the keyed hash cannot be built.
    pub fn sign(&self, payload: &str) -> Result<String, CipherError> {
        Ok(hex::encode(self.digest(payload)?))
    }

    /// Checks `signature_hex` against the expected signature of `payload` in
    /// constant time.  Malformed hex or a digest of the wrong length is a
    /// failed verification, not an error.
    pub fn verify(&self, payload: &str, signature_hex: &str) -> bool {
        let Ok(received) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(expected) = self.digest(payload) else {
            return false;
        };
        if received.len() != expected.len() {
            return false;
        }
        expected.as_slice().ct_eq(received.as_slice()).into()
    }

    fn digest(&self, payload: &str) -> Result<Vec<u8>, CipherError> {
        use hmac::Mac;

        let mut mac = keyed_hash(&self.secret)?;
        mac.update(payload.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
