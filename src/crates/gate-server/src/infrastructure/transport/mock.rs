//! Recording publisher for unit and integration tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::application::outbound::{MessagePublisher, PublishError};

/// One captured publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// A [`MessagePublisher`] that stores every message instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    should_fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose every publish fails (and records nothing).
    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            should_fail: true,
        }
    }

    /// Messages published so far, oldest first.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages published on `topic`.
    pub fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<(), PublishError> {
        if self.should_fail {
            return Err(PublishError {
                topic: topic.to_string(),
                reason: "simulated transport failure".to_string(),
            });
        }
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedMessage {
                topic: topic.to_string(),
                payload,
                retain,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_publisher_keeps_messages_in_order() {
        let publisher = RecordingPublisher::new();
        publisher.publish("a", "1".into(), false).await.unwrap();
        publisher.publish("b", "2".into(), true).await.unwrap();
        let published = publisher.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].payload, "2");
        assert_eq!(publisher.published_on("a").len(), 1);
    }

    #[tokio::test]
    async fn test_failing_publisher_returns_error() {
        let publisher = RecordingPublisher::failing();
        let err = publisher.publish("a", "1".into(), false).await.unwrap_err();
        assert_eq!(err.topic, "a");
        assert!(publisher.published().is_empty());
    }
}
