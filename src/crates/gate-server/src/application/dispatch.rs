//! CommandDispatcher: answers one authenticated request from the gate.
//!
//! For every inbound message the dispatcher:
//!
//! 1. Opens the frame (`IV=<n>|<hex>`), decrypting and verifying the inner
//!    signature.  Anything that fails here is dropped with no reply.
//! 2. Optionally refuses a nonce seen recently (see [`NonceWindow`]).
//! 3. Parses the command and executes it against the [`RecordStore`].
//! 4. Seals the reply under the request's nonce.
//!
//! # Architecture
//!
//! [`CommandDispatcher::handle_frame`] is synchronous and does no network
//! I/O, so the whole decision path is unit-testable without a broker.
//! [`relay_frame`] is the async glue that runs it on the blocking pool and
//! hands the result to a [`MessagePublisher`].

use std::sync::{Arc, Mutex, PoisonError};

use gate_core::{CipherError, Command, FrameCipher, NonceWindow, OpenError, RecordError, Reply};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::outbound::MessagePublisher;
use crate::application::record_store::{RecordStore, StoreError};

/// Why an inbound frame produced no reply.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("unauthenticated frame: {0}")]
    Unauthenticated(#[from] OpenError),

    #[error("nonce {nonce} was already accepted recently")]
    Replayed { nonce: u64 },

    #[error("reply could not be encrypted: {0}")]
    Seal(#[from] CipherError),
}

/// A reply ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Nonce shared by the request and the reply.
    pub nonce: u64,
    /// Plaintext reply, kept for logging and tests.
    pub reply: Reply,
    /// Lowercase hex ciphertext to publish on the response channel.
    pub ciphertext: String,
}

/// Executes authenticated commands against the record store.
#[derive(Debug)]
pub struct CommandDispatcher {
    cipher: FrameCipher,
    store: Arc<RecordStore>,
    replay: Mutex<NonceWindow>,
}

impl CommandDispatcher {
    /// Creates a dispatcher.  `replay_window` of zero disables nonce reuse
    /// detection.
    pub fn new(cipher: FrameCipher, store: Arc<RecordStore>, replay_window: usize) -> Self {
        Self {
            cipher,
            store,
            replay: Mutex::new(NonceWindow::new(replay_window)),
        }
    }

    /// Processes one raw inbound message.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when nothing must be published: the frame is
    /// malformed or unauthenticated, the nonce is a recent replay, or the
    /// reply could not be sealed.  The store is untouched in the first two
    /// cases.
    pub fn handle_frame(&self, raw: &[u8]) -> Result<DispatchOutcome, Rejection> {
        let request = self.cipher.open_request(raw)?;

        let fresh = self
            .replay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check_and_record(request.nonce);
        if !fresh {
            return Err(Rejection::Replayed {
                nonce: request.nonce,
            });
        }

        let reply = self.execute(&request.payload);
        let ciphertext = self.cipher.seal_reply(&reply.to_string(), request.nonce)?;
        Ok(DispatchOutcome {
            nonce: request.nonce,
            reply,
            ciphertext,
        })
    }

    /// Runs an authenticated payload against the store and builds the reply.
    ///
    /// Never fails: anything that goes wrong becomes [`Reply::Fail`], except
    /// for `CHECK`, where any lookup failure means "not authorized".
    pub fn execute(&self, payload: &str) -> Reply {
        let command = match Command::parse(payload) {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "unusable command");
                return Reply::Fail;
            }
        };

        match command {
            Command::Check { uid } => match self.store.lookup(&uid) {
                Ok(record) => {
                    info!(uid = %uid, "badge authorized");
                    Reply::Authorized {
                        uid,
                        name: record.holder_name,
                    }
                }
                Err(e) => {
                    if !matches!(e, StoreError::Record(RecordError::NotFound(_))) {
                        warn!(uid = %uid, error = %e, "lookup failed");
                    }
                    info!(uid = %uid, "badge denied");
                    Reply::Denied { uid }
                }
            },
            Command::Add { uid, name } => {
                let result = self.store.insert(&uid, &name);
                outcome("ADD", &uid, result, Reply::Added { uid: uid.clone() })
            }
            Command::Delete { uid } => {
                let result = self.store.delete(&uid).map(|_| ());
                outcome("DEL", &uid, result, Reply::Deleted { uid: uid.clone() })
            }
            Command::Edit { uid, name } => {
                let result = self.store.rename(&uid, &name).map(|_| ());
                outcome("EDIT", &uid, result, Reply::Edited { uid: uid.clone() })
            }
        }
    }
}

fn outcome(keyword: &str, uid: &str, result: Result<(), StoreError>, success: Reply) -> Reply {
    match result {
        Ok(()) => {
            info!(command = keyword, uid, "record updated");
            success
        }
        Err(StoreError::Persist(e)) => {
            error!(command = keyword, uid, error = %e, "record change not persisted");
            Reply::Fail
        }
        Err(StoreError::Record(e)) => {
            info!(command = keyword, uid, reason = %e, "command refused");
            Reply::Fail
        }
    }
}

/// Handles one inbound message end to end: dispatch on the blocking pool,
/// then publish the sealed reply on `response_topic`.
///
/// Rejected frames are logged at `warn` and produce no publish.  A publish
/// failure is logged; the store change (if any) stands.
pub async fn relay_frame(
    dispatcher: Arc<CommandDispatcher>,
    publisher: Arc<dyn MessagePublisher>,
    response_topic: String,
    payload: Vec<u8>,
) {
    let outcome =
        match tokio::task::spawn_blocking(move || dispatcher.handle_frame(&payload)).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "dispatch task failed");
                return;
            }
        };

    match outcome {
        Ok(outcome) => {
            debug!(nonce = outcome.nonce, reply = %outcome.reply, "publishing reply");
            if let Err(e) = publisher
                .publish(&response_topic, outcome.ciphertext, false)
                .await
            {
                warn!(error = %e, "reply publish failed");
            }
        }
        Err(Rejection::Seal(e)) => error!(error = %e, "reply dropped"),
        Err(rejection) => warn!(reason = %rejection, "inbound frame dropped"),
    }
}
