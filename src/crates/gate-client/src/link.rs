//! MQTT link between the emulated edge device and the broker.

use std::time::Duration;

use gate_core::{CipherError, Command, Reply};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, QoS};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::{EdgeSession, ResponseError};

/// Error type for the edge link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("cannot reach broker {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("broker {address} refused the connection: {code:?}")]
    Refused {
        address: String,
        code: ConnectReturnCode,
    },

    #[error("MQTT client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("connection lost: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("request could not be sealed: {0}")]
    Seal(#[from] CipherError),

    #[error("no authenticated reply within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// Broker and topic settings for the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub address: String,
    pub port: u16,
    pub command_topic: String,
    pub response_topic: String,
    pub status_topic: String,
    /// How long to wait for a reply (and for the broker at connect time).
    pub timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 1883,
            command_topic: "parking/cmd".to_string(),
            response_topic: "parking/resp".to_string(),
            status_topic: "parking/weather".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

impl LinkSettings {
    fn broker(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// A connected edge device: one MQTT session subscribed to the response and
/// status topics.
pub struct EdgeLink {
    client: AsyncClient,
    eventloop: EventLoop,
    settings: LinkSettings,
}

impl EdgeLink {
    /// Connects, waits for the broker to accept the session, and subscribes.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] if the broker is unreachable, refuses the
    /// session, or does not answer within `settings.timeout`.
    pub async fn connect(settings: LinkSettings) -> Result<Self, LinkError> {
        let client_id = format!("gate-edge-{}", Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, &settings.address, settings.port);
        options.set_keep_alive(Duration::from_secs(30));
        let (client, mut eventloop) = AsyncClient::new(options, 16);

        let address = settings.broker();
        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                        return if ack.code == ConnectReturnCode::Success {
                            Ok(())
                        } else {
                            Err(LinkError::Refused {
                                address: address.clone(),
                                code: ack.code,
                            })
                        };
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(LinkError::Connect {
                            address: address.clone(),
                            reason: e.to_string(),
                        })
                    }
                }
            }
        };
        tokio::time::timeout(settings.timeout, handshake)
            .await
            .map_err(|_| LinkError::Connect {
                address: address.clone(),
                reason: format!("no answer within {:?}", settings.timeout),
            })??;

        client
            .subscribe(settings.response_topic.as_str(), QoS::AtLeastOnce)
            .await?;
        client
            .subscribe(settings.status_topic.as_str(), QoS::AtLeastOnce)
            .await?;
        info!(broker = %address, "edge link connected");

        Ok(Self {
            client,
            eventloop,
            settings,
        })
    }

    /// Runs one full transaction: seal, publish, wait for the reply.
    ///
    /// Messages on the response topic that do not authenticate under this
    /// request's nonce are skipped; waiting continues until the timeout.
    ///
    /// # Errors
    ///
    /// [`LinkError::Timeout`] when no authentic reply arrives in time,
    /// [`LinkError::Response`] for an authentic but unrecognised reply, and
    /// transport errors otherwise.
    pub async fn transact(
        &mut self,
        session: &mut EdgeSession,
        command: &Command,
    ) -> Result<Reply, LinkError> {
        let request = session.prepare(command)?;
        debug!(payload = request.payload(), nonce = request.nonce(), "sending request");
        self.client
            .publish(
                self.settings.command_topic.as_str(),
                QoS::AtLeastOnce,
                false,
                request.frame().as_bytes().to_vec(),
            )
            .await?;

        let deadline = Instant::now() + self.settings.timeout;
        loop {
            let event = tokio::time::timeout_at(deadline, self.eventloop.poll())
                .await
                .map_err(|_| LinkError::Timeout(self.settings.timeout))??;
            let Event::Incoming(Incoming::Publish(message)) = event else {
                continue;
            };
            if message.topic != self.settings.response_topic {
                continue;
            }
            match request.accept(&message.payload) {
                Ok(reply) => return Ok(reply),
                Err(ResponseError::Unauthenticated(e)) => {
                    debug!(error = %e, "ignoring response not meant for this request");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Waits for the next status line (the retained one arrives first).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Connection`] if the session drops.
    pub async fn next_status(&mut self) -> Result<String, LinkError> {
        loop {
            if let Event::Incoming(Incoming::Publish(message)) = self.eventloop.poll().await? {
                if message.topic == self.settings.status_topic {
                    return Ok(String::from_utf8_lossy(&message.payload).into_owned());
                }
            }
        }
    }

    /// Sends DISCONNECT and flushes it.
    pub async fn close(mut self) {
        if self.client.try_disconnect().is_err() {
            return;
        }
        let flush = async {
            while let Ok(event) = self.eventloop.poll().await {
                if matches!(event, Event::Outgoing(rumqttc::Outgoing::Disconnect)) {
                    break;
                }
            }
        };
        if tokio::time::timeout(Duration::from_secs(1), flush).await.is_err() {
            warn!("timed out closing the broker session");
        }
    }
}
