//! Simulated Modem Runner
//!
//! Builds a modem from a JSON config, runs it on the modem actor and logs
//! every signal it emits until interrupted.
//!
//! # Usage
//!
//! ```bash
//! pseudomodem-sim --config modem.json --connect --apn internet
//! pseudomodem-sim --write-config modem.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mm_protocol::{PropertyMap, PropertyValue};
use pseudomodem::{Modem, ModemConfig, ModemHandle, ModemSignal, SimCard, TimingConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pseudomodem-sim")]
#[command(about = "Simulated cellular modem", long_about = None)]
struct Cli {
    /// Modem config file (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective config to this file and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Use device-like delays instead of instant completion
    #[arg(long)]
    realistic: bool,

    /// Start without a SIM
    #[arg(long)]
    no_sim: bool,

    /// Connect once enabled
    #[arg(long)]
    connect: bool,

    /// APN used with --connect
    #[arg(long, default_value = "internet")]
    apn: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pseudomodem=info,pseudomodem_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ModemConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ModemConfig::default(),
    };
    if cli.realistic {
        config.timing = TimingConfig::realistic();
    }

    if let Some(path) = &cli.write_config {
        config.save(path)?;
        info!("Wrote config to {}", path.display());
        return Ok(());
    }

    // The modem only holds the SIM weakly; keep it alive for the whole run
    let sim = if cli.no_sim {
        None
    } else {
        Some(Arc::new(
            config
                .sim
                .clone()
                .unwrap_or_else(|| SimCard::new("310260", "Home")),
        ))
    };

    let mut modem = Modem::from_config(&config)?;
    modem.set_sim(sim.as_ref());
    info!("Starting simulated modem at {}", modem.path());

    let handle = ModemHandle::spawn(modem);
    let signals = tokio::spawn(log_signals(handle.subscribe()));

    match handle.enable(true).await {
        Ok(()) => info!("Modem enabled"),
        Err(e) => error!("Enable failed: {}", e),
    }

    if cli.connect {
        let properties =
            PropertyMap::from([("apn".to_string(), PropertyValue::from(cli.apn.as_str()))]);
        match handle.connect(properties).await {
            Ok(bearer) => info!("Connected on {}", bearer),
            Err(e) => error!("Connect failed: {}", e),
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown().await;
    drop(handle);
    signals.await?;
    drop(sim);
    Ok(())
}

async fn log_signals(mut rx: tokio::sync::broadcast::Receiver<ModemSignal>) {
    loop {
        match rx.recv().await {
            Ok(ModemSignal::StateChanged { old, new, reason }) => {
                info!("StateChanged {} -> {} ({:?})", old, new, reason);
            }
            Ok(ModemSignal::MessageReceived { sender, content }) => {
                info!("MessageReceived from {}: {}", sender, content);
            }
            Err(RecvError::Lagged(n)) => warn!("Dropped {} signals", n),
            Err(RecvError::Closed) => break,
        }
    }
}
