use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use gatebridge_core::{Bridge, BridgeConfig, LedgerLoader, Outbox};
use gatebridge_data::RawCommand;
use gatebridge_lib::host;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "gatebridge.toml")]
    config: String,

    /// Log filter used when RUST_LOG is unset (overrides the config file)
    #[arg(long)]
    log_filter: Option<String>,

    /// Instantiate the builtin engine at boot instead of waiting for a module
    #[arg(long)]
    builtin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = BridgeConfig::load(&args.config)?;
    let found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    if args.builtin {
        config.lifecycle.request_module_on_boot = false;
    }
    config.validate()?;

    let filter = args
        .log_filter
        .clone()
        .unwrap_or_else(|| config.logging.filter.clone());
    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or(filter),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    if !found {
        tracing::info!("No config at {}, using defaults", args.config);
    }
    tracing::info!(
        config = %args.config,
        fingerprint = %config.fingerprint(),
        "gatebridge starting"
    );

    let (outbox, out_rx) = Outbox::channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    if args.builtin {
        in_tx.send(RawCommand::new("nodeJs"))?;
    }

    let loader = Arc::new(LedgerLoader::new(config.engine.clone()));
    let bridge = Bridge::new(&config, loader, outbox);

    let reader = tokio::spawn(host::read_commands(BufReader::new(tokio::io::stdin()), in_tx));
    let writer = tokio::spawn(host::write_messages(tokio::io::stdout(), out_rx));

    bridge.run(in_rx).await?;
    writer.await??;
    // The reader may still be parked on stdin; the bridge is already done.
    reader.abort();

    tracing::info!("gatebridge exited");
    Ok(())
}
