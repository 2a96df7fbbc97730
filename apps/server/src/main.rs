use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use promozap_config::{load_from as load_config, AppConfig};
use promozap_runtime::{build_relay, shutdown_signal, telemetry};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "promozap")]
#[command(about = "Relays inbound WhatsApp messages through Redis pub/sub")]
struct Cli {
    /// Configuration file to load instead of the default search paths
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the relay until interrupted (default)
    Run,
    /// Print the resolved configuration and exit
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_relay(config).await,
        Commands::ShowConfig => {
            println!("{}", render_config(&config)?);
            Ok(())
        }
    }
}

fn render_config(config: &AppConfig) -> anyhow::Result<String> {
    serde_json::to_string_pretty(config).context("failed to render configuration")
}

async fn run_relay(config: AppConfig) -> anyhow::Result<()> {
    telemetry::init_tracing(&config.logging.filter).context("failed to initialise tracing")?;

    info!("starting PromoZap relay");

    let mut relay = build_relay(&config)
        .await
        .context("failed to connect to the message broker")?;

    if let Err(err) = relay.start().await {
        error!(error = %err, "relay failed to start");
        relay.shutdown().await;
        return Err(err).context("relay failed to start");
    }

    info!("relay running, press Ctrl-C to stop");
    shutdown_signal().await;

    let report = relay.shutdown().await;
    if let Some(stats) = report.subscription {
        info!(
            forwarded = stats.forwarded,
            ignored = stats.ignored,
            rejected = stats.rejected,
            "subscription drained"
        );
    }
    if !report.is_clean() {
        warn!(errors = report.errors.len(), "teardown finished with errors");
    }

    info!("relay shut down");
    Ok(())
}
