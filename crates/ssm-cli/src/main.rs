//! SESAME OS3 command-line client.
//!
//! Connects to one lock over Bluetooth LE, prints every status record as a
//! JSON line on stdout, and optionally locks or unlocks once the session is
//! ready. Runs until Ctrl-C or until reconnection gives up.
//!
//! # Usage
//!
//! ```bash
//! # Watch status
//! ssm --address AA:BB:CC:DD:EE:FF --secret-key 00112233445566778899aabbccddeeff
//!
//! # Unlock once connected, recorded as "cli" in the device history
//! ssm --address AA:BB:CC:DD:EE:FF --secret-key ... --action unlock --history cli
//! ```

use std::{
    io::{self, Write},
    time::Duration,
};

use clap::{Parser, ValueEnum};
use ssm_client::{Callbacks, Client, ReconnectPolicy, ble::BleTransport};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Action {
    Lock,
    Unlock,
}

/// SESAME OS3 lock client
#[derive(Parser, Debug)]
#[command(name = "ssm")]
#[command(about = "Monitor and operate a SESAME OS3 lock over Bluetooth LE")]
#[command(version)]
struct Args {
    /// Device Bluetooth address, e.g. AA:BB:CC:DD:EE:FF
    #[arg(short, long)]
    address: String,

    /// Device secret key, 32 hex characters
    #[arg(short, long, env = "SSM_SECRET_KEY", hide_env_values = true)]
    secret_key: String,

    /// Retries after a failed or lost session
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Seconds between retries
    #[arg(long, default_value = "5")]
    retry_interval: u64,

    /// Seconds to scan for the device on each connect
    #[arg(long, default_value = "8")]
    discovery_timeout: u64,

    /// Command to send once connected
    #[arg(long, value_enum)]
    action: Option<Action>,

    /// Name recorded in the device history for the command
    #[arg(long, default_value = "ssm-cli")]
    history: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr; stdout carries status records only
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let transport = BleTransport::new()
        .await?
        .with_discovery_timeout(Duration::from_secs(args.discovery_timeout));

    let (connect_tx, mut connect_rx) = mpsc::unbounded_channel();
    let callbacks = Callbacks::new()
        .on_status(|status, _raw| match serde_json::to_string(status) {
            Ok(line) => {
                let _ = writeln!(io::stdout().lock(), "{line}");
            },
            Err(err) => tracing::warn!(error = %err, "cannot encode status"),
        })
        .on_connect(move |connected| {
            let _ = connect_tx.send(connected);
        });

    let client = Client::new(transport, callbacks);
    let policy = ReconnectPolicy {
        max_retries: args.max_retries,
        interval: Duration::from_secs(args.retry_interval),
    };
    client.connect(args.address.clone(), &args.secret_key, policy)?;
    tracing::info!(address = %args.address, "connecting");

    let mut action = args.action;
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break Ok(());
            },
            event = connect_rx.recv() => match event {
                Some(true) => {
                    tracing::info!("connected");
                    match action.take() {
                        Some(Action::Lock) => client.lock(&args.history),
                        Some(Action::Unlock) => client.unlock(&args.history),
                        None => {},
                    }
                },
                Some(false) => break Err("could not connect to the lock".into()),
                None => break Ok(()),
            },
        }
    };

    client.stop().await;
    outcome
}
