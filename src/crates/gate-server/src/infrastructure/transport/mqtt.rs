//! MQTT adapter built on `rumqttc`.
//!
//! # How rumqttc is driven (for beginners)
//!
//! `rumqttc` splits a connection into two halves:
//!
//! - an [`AsyncClient`], a cheap cloneable handle used to publish and
//!   subscribe (requests are queued on a channel), and
//! - an [`EventLoop`], which owns the socket.  Nothing is sent or received
//!   unless somebody keeps calling [`EventLoop::poll`].
//!
//! [`connect`] polls until the broker accepts the session, so a wrong
//! address fails at startup.  After that, [`CommandListener::run`] owns the
//! event loop for the life of the process: it hands inbound command frames
//! to the dispatcher and keeps polling through connection errors, which
//! makes `rumqttc` reconnect on its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::application::dispatch::{relay_frame, CommandDispatcher};
use crate::application::outbound::{MessagePublisher, PublishError};
use crate::infrastructure::storage::config::BrokerConfig;

/// Capacity of the request channel between [`AsyncClient`] and [`EventLoop`].
const REQUEST_CHANNEL_CAPACITY: usize = 64;

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Error type for the MQTT transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot reach broker {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("broker {address} refused the connection: {code:?}")]
    Refused {
        address: String,
        code: ConnectReturnCode,
    },

    #[error("no answer from broker {address} within {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("MQTT client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Builds connection options from the broker configuration.
pub fn mqtt_options(config: &BrokerConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.address, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_clean_session(true);
    options
}

/// Opens a session with the broker and waits for it to be accepted.
///
/// # Errors
///
/// Returns [`TransportError`] if the broker is unreachable, refuses the
/// session, or does not answer within `timeout`.
pub async fn connect(
    config: &BrokerConfig,
    timeout: Duration,
) -> Result<(AsyncClient, EventLoop), TransportError> {
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CHANNEL_CAPACITY);
    let address = format!("{}:{}", config.address, config.port);
    await_connection(&mut eventloop, &address, timeout).await?;
    info!(broker = %address, client_id = %config.client_id, "connected to broker");
    Ok((client, eventloop))
}

async fn await_connection(
    eventloop: &mut EventLoop,
    address: &str,
    timeout: Duration,
) -> Result<(), TransportError> {
    let handshake = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    return if ack.code == ConnectReturnCode::Success {
                        Ok(())
                    } else {
                        Err(TransportError::Refused {
                            address: address.to_string(),
                            code: ack.code,
                        })
                    };
                }
                Ok(other) => debug!(event = ?other, "event before connection acknowledgement"),
                Err(e) => {
                    return Err(TransportError::Connect {
                        address: address.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
    };
    tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| TransportError::Timeout {
            address: address.to_string(),
            timeout,
        })?
}

// ── Publisher ─────────────────────────────────────────────────────────────────

/// [`MessagePublisher`] that publishes through the broker at QoS 1.
#[derive(Debug, Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessagePublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<(), PublishError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload.into_bytes())
            .await
            .map_err(|e| PublishError {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Topics the listener works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerTopics {
    pub command: String,
    pub response: String,
}

/// Drives the MQTT event loop and dispatches inbound command frames.
pub struct CommandListener {
    client: AsyncClient,
    eventloop: EventLoop,
    dispatcher: Arc<CommandDispatcher>,
    publisher: Arc<dyn MessagePublisher>,
    topics: ListenerTopics,
    reconnect_backoff: Duration,
}

impl CommandListener {
    pub fn new(
        client: AsyncClient,
        eventloop: EventLoop,
        dispatcher: Arc<CommandDispatcher>,
        publisher: Arc<dyn MessagePublisher>,
        topics: ListenerTopics,
        reconnect_backoff: Duration,
    ) -> Self {
        Self {
            client,
            eventloop,
            dispatcher,
            publisher,
            topics,
            reconnect_backoff,
        }
    }

    /// Subscribes to the command topic.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the request cannot be queued.
    pub async fn subscribe(&self) -> Result<(), TransportError> {
        self.client
            .subscribe(self.topics.command.as_str(), QoS::AtLeastOnce)
            .await?;
        info!(topic = %self.topics.command, "subscribed to command topic");
        Ok(())
    }

    /// Polls the event loop until `shutdown` flips to `true`.
    ///
    /// Each command frame is handled on its own task; in-flight frames are
    /// allowed to finish before the session is closed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut inflight = JoinSet::new();

        loop {
            tokio::select! {
                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::Publish(message))) => {
                        if message.topic == self.topics.command {
                            inflight.spawn(relay_frame(
                                Arc::clone(&self.dispatcher),
                                Arc::clone(&self.publisher),
                                self.topics.response.clone(),
                                message.payload.to_vec(),
                            ));
                        } else {
                            debug!(topic = %message.topic, "ignoring message on unexpected topic");
                        }
                    }
                    Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                        // Clean sessions drop subscriptions on reconnect.
                        info!(code = ?ack.code, "broker session re-established");
                        if let Err(e) = self
                            .client
                            .try_subscribe(self.topics.command.as_str(), QoS::AtLeastOnce)
                        {
                            error!(error = %e, "resubscribe failed");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            error = %e,
                            backoff_secs = self.reconnect_backoff.as_secs(),
                            "broker connection lost; retrying"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(self.reconnect_backoff) => {}
                            _ = shutdown.changed() => {}
                        }
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                },
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "command task failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.close(inflight).await;
    }

    async fn close(mut self, mut inflight: JoinSet<()>) {
        let drain = async {
            // Keep polling so replies of in-flight frames still go out.
            while !inflight.is_empty() {
                tokio::select! {
                    _ = inflight.join_next() => {}
                    polled = self.eventloop.poll() => {
                        if polled.is_err() {
                            break;
                        }
                    }
                }
            }
            if self.client.try_disconnect().is_ok() {
                loop {
                    match self.eventloop.poll().await {
                        Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, drain).await.is_err() {
            warn!("timed out closing the broker session");
        }
        info!("command listener stopped");
    }
}
