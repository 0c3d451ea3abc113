//! Parking gate access service: entry point.
//!
//! The edge device at the car park barrier reads RFID badges and sends
//! encrypted, signed commands over MQTT.  This process answers them from the
//! badge table on disk and, every few seconds, publishes a status line with
//! the time, the weather, and the number of free places.
//!
//! # Usage
//!
//! ```text
//! gate-server [--config <PATH>]
//! ```
//!
//! The configuration path defaults to `gate.toml` and may also be given in
//! `GATE_CONFIG`.  A missing file means "all defaults"; the shared secret
//! must still be supplied, for example through `GATE_SHARED_SECRET`.
//!
//! # Architecture overview
//!
//! ```text
//! edge device ──MQTT parking/cmd──► CommandListener ──► CommandDispatcher
//!                                                            │
//!                                                       RecordStore ◄── StatusPublisher
//!                                                            │                │
//! edge device ◄─MQTT parking/resp── MqttPublisher ◄──────────┘                │
//! display     ◄─MQTT parking/weather (retained) ◄─────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gate_core::FrameCipher;
use gate_server::application::dispatch::CommandDispatcher;
use gate_server::application::outbound::MessagePublisher;
use gate_server::application::record_store::RecordStore;
use gate_server::application::status::{StatusPublisher, WeatherSource};
use gate_server::infrastructure::storage::config::{load_config, GateConfig};
use gate_server::infrastructure::storage::record_file::CsvRecordFile;
use gate_server::infrastructure::transport::mqtt::{
    connect, CommandListener, ListenerTopics, MqttPublisher,
};
use gate_server::infrastructure::weather::{OfflineWeather, OpenWeatherClient};

/// How long to wait for the broker to accept the session at startup.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Parking gate access service.
#[derive(Debug, Parser)]
#[command(
    name = "gate-server",
    about = "Answers encrypted badge commands and publishes car park status over MQTT",
    version
)]
struct Cli {
    /// Path of the TOML configuration file.
    #[arg(long, default_value = "gate.toml", env = "GATE_CONFIG")]
    config: PathBuf,
}

fn load_effective_config(path: &Path) -> anyhow::Result<GateConfig> {
    let mut config = load_config(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .context("invalid environment override")?;
    Ok(config)
}

fn weather_source(config: &GateConfig) -> anyhow::Result<Arc<dyn WeatherSource>> {
    if config.weather.api_key.is_empty() {
        info!("no weather API key configured; status line will show OFFLINE");
        return Ok(Arc::new(OfflineWeather));
    }
    let client =
        OpenWeatherClient::new(&config.weather).context("failed to build weather client")?;
    Ok(Arc::new(client))
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. The configuration is loaded and `GATE_*` overrides applied.
/// 2. `tracing_subscriber` is initialised: `RUST_LOG` wins, otherwise the
///    configured `service.log_level`.
/// 3. The configuration is validated and the record file opened.
/// 4. The broker connection is established.  Failure here exits non-zero.
/// 5. The command listener and the status publisher are spawned; both stop
///    when Ctrl+C flips the shutdown channel.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_effective_config(&cli.config)?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    config.validate().context("invalid configuration")?;
    info!(
        broker = %format!("{}:{}", config.broker.address, config.broker.port),
        storage = %config.parking.storage_path.display(),
        max_capacity = config.parking.max_capacity,
        replay_window = config.security.replay_window,
        "gate service starting"
    );

    // ── Record store ──────────────────────────────────────────────────────────
    let record_file = CsvRecordFile::new(&config.parking.storage_path);
    let store = Arc::new(RecordStore::open(Box::new(record_file)).with_context(|| {
        format!(
            "failed to open record file {}",
            config.parking.storage_path.display()
        )
    })?);

    // ── Broker connection ─────────────────────────────────────────────────────
    let (client, eventloop) = connect(&config.broker, CONNECT_TIMEOUT)
        .await
        .context("failed to connect to MQTT broker")?;
    let publisher: Arc<dyn MessagePublisher> = Arc::new(MqttPublisher::new(client.clone()));

    let dispatcher = Arc::new(CommandDispatcher::new(
        FrameCipher::new(config.shared_secret()),
        Arc::clone(&store),
        config.security.replay_window,
    ));
    let listener = CommandListener::new(
        client,
        eventloop,
        dispatcher,
        Arc::clone(&publisher),
        ListenerTopics {
            command: config.topics.command.clone(),
            response: config.topics.response.clone(),
        },
        Duration::from_secs(config.broker.reconnect_backoff_secs),
    );
    listener
        .subscribe()
        .await
        .context("failed to subscribe to command topic")?;

    let status = StatusPublisher::new(
        Arc::clone(&store),
        weather_source(&config)?,
        publisher,
        config.status_settings(),
    );

    // ── Tasks and graceful shutdown ───────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener_task = tokio::spawn(listener.run(shutdown_rx.clone()));
    let status_task = tokio::spawn(status.run(shutdown_rx));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C; shutting down"),
        Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
    }
    // Receivers may already be gone if a task ended early.
    let _ = shutdown_tx.send(true);

    status_task.await.context("status task panicked")?;
    listener_task.await.context("listener task panicked")?;

    info!(records = store.count(), "gate service stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
