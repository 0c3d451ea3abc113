//! Opt-in, bounded memory of recently accepted nonces.
//!
//! The base protocol has no replay protection: a captured frame re-sent
//! later decrypts and verifies exactly like the original.  A `NonceWindow`
//! remembers the last `capacity` accepted nonces so a verbatim resend inside
//! that window can be refused.  A capacity of zero disables the check.
//!
//! Only nonces of *authenticated* requests should be recorded; otherwise an
//! unauthenticated sender could flush genuine entries out of the window.

use std::collections::{HashSet, VecDeque};

use tracing::trace;

/// FIFO-bounded set of nonces.
#[derive(Debug, Default)]
pub struct NonceWindow {
    capacity: usize,
    seen: HashSet<u64>,
    order: VecDeque<u64>,
}

impl NonceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            // Grows with use; `capacity` comes from configuration unchecked.
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Records `nonce` and returns `true` if it was not already in the
    /// window.  Always `true` when the window is disabled.
    pub fn check_and_record(&mut self, nonce: u64) -> bool {
        if !self.is_enabled() {
            return true;
        }
        if !self.seen.insert(nonce) {
            return false;
        }
        self.order.push_back(nonce);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
                trace!(evicted, "nonce window full; oldest entry evicted");
            }
        }
        true
    }
}
