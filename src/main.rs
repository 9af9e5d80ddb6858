mod cli;
mod color;
mod config;
mod container_tail;
mod error;
mod kubernetes;
mod pod_tail;
mod reconciler;
mod selector;
#[cfg(test)]
mod testing;
mod types;
mod utils;

use anyhow::Context;
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use cli::Cli;
use color::{ColorAssigner, ColorMode, StdoutSink};
use config::TailConfig;
use kubernetes::KubeClient;
use reconciler::{Reconciler, StopHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr so they never interleave with tailed lines on stdout
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = TailConfig::from_cli(&cli).context("invalid configuration")?;
    if !std::io::stdout().is_terminal() && config.color_mode != ColorMode::Off {
        debug!("stdout is not a terminal, disabling colors");
        config.color_mode = ColorMode::Off;
    }

    let client = KubeClient::connect(cli.kubeconfig.as_deref(), cli.context.as_deref())
        .await
        .context("failed to set up kubernetes client")?;

    let assigner = Arc::new(ColorAssigner::new(config.color_mode, Arc::new(StdoutSink)));
    let mut reconciler = Reconciler::new(Arc::new(client), assigner, config);

    tokio::spawn(stop_on_signal(reconciler.stop_handle()));

    reconciler.run().await;
    Ok(())
}

async fn stop_on_signal(stop: StopHandle) {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for interrupt: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                warn!("Could not listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received interrupt, stopping"),
        _ = terminate => info!("Received SIGTERM, stopping"),
    }
    stop.stop();
}
