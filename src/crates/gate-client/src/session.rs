//! Edge-side request building and reply checking.
//!
//! An [`EdgeSession`] lives as long as the emulated device: it draws a
//! random session id once and numbers every request.  Each request becomes a
//! [`PendingRequest`], which remembers the nonce it was sealed under and is
//! the only thing able to open the matching reply.

use gate_core::{CipherError, Command, CommandError, FrameCipher, OpenError, Reply, SharedSecret};
use rand::Rng;
use thiserror::Error;

/// Why a message on the response topic was not accepted as our reply.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// Not sealed under our nonce and secret: someone else's reply, or noise.
    #[error("response does not authenticate: {0}")]
    Unauthenticated(#[from] OpenError),

    /// Authentic, but not a reply shape the service produces.
    #[error("unexpected reply: {0}")]
    Unrecognised(#[from] CommandError),
}

/// State of one emulated edge device.
#[derive(Debug)]
pub struct EdgeSession {
    cipher: FrameCipher,
    session_id: u32,
    counter: u32,
}

impl EdgeSession {
    /// Starts a session with a random id.
    pub fn new(secret: SharedSecret) -> Self {
        Self::with_id(secret, rand::thread_rng().gen())
    }

    pub fn with_id(secret: SharedSecret, session_id: u32) -> Self {
        Self {
            cipher: FrameCipher::new(secret),
            session_id,
            counter: 0,
        }
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Number of requests prepared so far.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Seals `command` under a fresh random 32-bit nonce.
    pub fn prepare(&mut self, command: &Command) -> Result<PendingRequest, CipherError> {
        let nonce = u64::from(rand::thread_rng().gen::<u32>());
        self.prepare_with_nonce(command, nonce)
    }

    /// Seals `command` under `nonce`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] if the keyed hash cannot be initialised.
    pub fn prepare_with_nonce(
        &mut self,
        command: &Command,
        nonce: u64,
    ) -> Result<PendingRequest, CipherError> {
        self.counter = self.counter.wrapping_add(1);
        let payload = format!("{command};C={};S={}", self.counter, self.session_id);
        let frame = self.cipher.seal_request(&payload, nonce)?;
        Ok(PendingRequest {
            cipher: self.cipher.clone(),
            nonce,
            payload,
            frame: frame.to_string(),
        })
    }
}

/// A sealed request waiting for its reply.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    cipher: FrameCipher,
    nonce: u64,
    payload: String,
    frame: String,
}

impl PendingRequest {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Plaintext payload, diagnostics included.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Wire text to publish on the command topic.
    pub fn frame(&self) -> &str {
        &self.frame
    }

    /// Tries to open `response` as the reply to this request.
    ///
    /// # Errors
    ///
    /// [`ResponseError::Unauthenticated`] means "keep waiting"; the message
    /// was not meant for us.
    pub fn accept(&self, response: &[u8]) -> Result<Reply, ResponseError> {
        let text = String::from_utf8_lossy(response);
        let plaintext = self.cipher.open_reply(text.trim(), self.nonce)?;
        Ok(Reply::parse(&plaintext)?)
    }
}
