//! Outbound publishing seam.
//!
//! Both the dispatcher (encrypted replies) and the status publisher (plain
//! status lines) hand their messages to a [`MessagePublisher`].  The MQTT
//! adapter implements it in production; tests use
//! [`crate::infrastructure::transport::mock::RecordingPublisher`].

use async_trait::async_trait;
use thiserror::Error;

/// Error returned when a message could not be handed to the transport.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("publish to {topic} failed: {reason}")]
pub struct PublishError {
    pub topic: String,
    pub reason: String,
}

/// Trait for sending one payload on a named channel.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes `payload` on `topic`.  `retain` asks the broker to keep the
    /// last value for late subscribers.
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<(), PublishError>;
}
