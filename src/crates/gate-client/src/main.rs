//! Edge-device emulator: entry point.
//!
//! Sends one badge command to the gate service the way the barrier firmware
//! does, then prints the decoded reply.  Useful for enrolling badges from a
//! workstation and for checking a deployment end to end.
//!
//! # Usage
//!
//! ```text
//! gate-client [OPTIONS] <COMMAND>
//!
//! Commands:
//!   check <UID>          Is this badge authorized?
//!   add   <UID> <NAME>   Authorize a badge
//!   del   <UID>          Revoke a badge
//!   edit  <UID> <NAME>   Change the holder name
//!   watch                Print status lines as they are published
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Default      | Description             |
//! |-----------------------|--------------|-------------------------|
//! | `GATE_BROKER_ADDRESS` | `127.0.0.1`  | MQTT broker host        |
//! | `GATE_BROKER_PORT`    | `1883`       | MQTT broker port        |
//! | `GATE_SHARED_SECRET`  | (required)   | Key shared with server  |

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gate_client::{EdgeLink, EdgeSession, LinkSettings};
use gate_core::{Command, Reply, SharedSecret};
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Parking gate edge-device emulator.
#[derive(Debug, Parser)]
#[command(
    name = "gate-client",
    about = "Sends encrypted badge commands to the parking gate service",
    version
)]
struct Cli {
    /// MQTT broker host.
    #[arg(long, default_value = "127.0.0.1", env = "GATE_BROKER_ADDRESS")]
    broker_address: String,

    /// MQTT broker port.
    #[arg(long, default_value_t = 1883, env = "GATE_BROKER_PORT")]
    broker_port: u16,

    /// Secret shared with the gate service.
    #[arg(long, env = "GATE_SHARED_SECRET", hide_env_values = true)]
    secret: String,

    /// Milliseconds to wait for the reply.
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,

    #[arg(long, default_value = "parking/cmd")]
    command_topic: String,

    #[arg(long, default_value = "parking/resp")]
    response_topic: String,

    #[arg(long, default_value = "parking/weather")]
    status_topic: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Is this badge authorized?
    Check { uid: String },
    /// Authorize a badge.
    Add { uid: String, name: String },
    /// Revoke a badge.
    Del { uid: String },
    /// Change the holder name of a badge.
    Edit { uid: String, name: String },
    /// Print status lines as they are published.
    Watch,
}

impl Action {
    fn to_command(&self) -> Option<Command> {
        match self {
            Self::Check { uid } => Some(Command::Check { uid: uid.clone() }),
            Self::Add { uid, name } => Some(Command::Add {
                uid: uid.clone(),
                name: name.clone(),
            }),
            Self::Del { uid } => Some(Command::Delete { uid: uid.clone() }),
            Self::Edit { uid, name } => Some(Command::Edit {
                uid: uid.clone(),
                name: name.clone(),
            }),
            Self::Watch => None,
        }
    }
}

impl Cli {
    fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            address: self.broker_address.clone(),
            port: self.broker_port,
            command_topic: self.command_topic.clone(),
            response_topic: self.response_topic.clone(),
            status_topic: self.status_topic.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

fn describe(reply: &Reply) -> String {
    match reply {
        Reply::Authorized { uid, name } => format!("{uid}: authorized ({name})"),
        Reply::Denied { uid } => format!("{uid}: not authorized"),
        Reply::Added { uid } => format!("{uid}: added"),
        Reply::Deleted { uid } => format!("{uid}: deleted"),
        Reply::Edited { uid } => format!("{uid}: renamed"),
        Reply::Fail => "command refused".to_string(),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(!cli.secret.is_empty(), "the shared secret must not be empty");

    let mut link = EdgeLink::connect(cli.link_settings())
        .await
        .context("failed to connect to MQTT broker")?;

    let Some(command) = cli.action.to_command() else {
        loop {
            tokio::select! {
                status = link.next_status() => {
                    println!("{}", status.context("status subscription ended")?);
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        link.close().await;
        return Ok(ExitCode::SUCCESS);
    };

    let mut session = EdgeSession::new(SharedSecret::from(cli.secret.as_str()));
    let reply = link.transact(&mut session, &command).await;
    link.close().await;

    let reply = reply.with_context(|| format!("{} transaction failed", command.keyword()))?;
    println!("{}", describe(&reply));
    Ok(if reply.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
