//! Sealing and opening complete messages.
//!
//! Inside every ciphertext sits `<payload>|<hex-hmac-of-payload>`.  The
//! helpers here combine [`Frame`] parsing, [`FrameCipher`] decryption, and
//! signature verification into the four operations the two parties need:
//!
//! ```text
//! edge device                                   service
//! seal_request(payload, n) ── IV=n|hex ──────►  open_request(raw)
//! open_reply(hex, n)       ◄──────── hex ────── seal_reply(reply, n)
//! ```
//!
//! The reply is encrypted under the request's nonce; the response carries no
//! `IV=` prefix because the edge device already knows the nonce it sent.

use thiserror::Error;

use crate::protocol::cipher::{CipherError, FrameCipher};
use crate::protocol::frame::{Frame, FrameError, FIELD_SEPARATOR};

/// Reasons a received message cannot be trusted.
#[derive(Debug, Error, PartialEq)]
pub enum OpenError {
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),

    #[error("undecryptable ciphertext: {0}")]
    Cipher(#[from] CipherError),

    /// The plaintext is not exactly `<payload>|<signature>`.
    #[error("decrypted text is not `<payload>|<signature>`")]
    MalformedInner,

    #[error("signature does not match payload")]
    BadSignature,
}

/// An inbound request whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedRequest {
    /// Nonce the request was encrypted under; the reply reuses it.
    pub nonce: u64,
    /// Authenticated command text, e.g. `CHECK;AB12`.
    pub payload: String,
}

impl FrameCipher {
    /// Parses, decrypts, and authenticates a raw inbound frame.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] for any framing, decoding, or signature failure.
    /// All of them mean "drop silently" to the caller.
    pub fn open_request(&self, raw: &[u8]) -> Result<OpenedRequest, OpenError> {
        let frame = Frame::from_bytes(raw)?;
        let payload = self.open_inner(&frame.ciphertext, frame.nonce)?;
        Ok(OpenedRequest {
            nonce: frame.nonce,
            payload,
        })
    }

    /// Signs `reply`, then encrypts `reply|signature` under `nonce`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] if signing or encryption fails.  The caller
    /// must not publish anything in that case.
    pub fn seal_reply(&self, reply: &str, nonce: u64) -> Result<String, CipherError> {
        self.seal_inner(reply, nonce)
    }

    /// Builds a complete request frame for `payload` under `nonce`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] if signing or encryption fails.
    pub fn seal_request(&self, payload: &str, nonce: u64) -> Result<Frame, CipherError> {
        Ok(Frame::new(nonce, self.seal_inner(payload, nonce)?))
    }

    /// Decrypts and authenticates a reply received for a request sent under
    /// `nonce`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] if the reply cannot be decoded or its signature
    /// does not verify.
    pub fn open_reply(&self, ciphertext_hex: &str, nonce: u64) -> Result<String, OpenError> {
        self.open_inner(ciphertext_hex.trim(), nonce)
    }

    fn seal_inner(&self, payload: &str, nonce: u64) -> Result<String, CipherError> {
        let signature = self.sign(payload)?;
        self.encrypt(&format!("{payload}{FIELD_SEPARATOR}{signature}"), nonce)
    }

    fn open_inner(&self, ciphertext_hex: &str, nonce: u64) -> Result<String, OpenError> {
        let plaintext = self.decrypt(ciphertext_hex, nonce)?;

        let (payload, signature) = plaintext
            .split_once(FIELD_SEPARATOR)
            .ok_or(OpenError::MalformedInner)?;
        if signature.contains(FIELD_SEPARATOR) {
            return Err(OpenError::MalformedInner);
        }

        if !self.verify(payload, signature) {
            return Err(OpenError::BadSignature);
        }
        Ok(payload.to_string())
    }
}
