//! CLI interface for trade-relay
//!
//! Provides subcommands for:
//! - `produce`: Stream exchange trades into Kafka
//! - `consume`: Persist Kafka events into Postgres
//! - `migrate`: Create the trade table
//! - `config`: Show configuration

mod consume;
mod migrate;
mod produce;

pub use consume::ConsumeArgs;
pub use migrate::MigrateArgs;
pub use produce::ProduceArgs;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "trade-relay")]
#[command(about = "Relays exchange trade events through Kafka into Postgres")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream exchange trades into Kafka
    Produce(ProduceArgs),
    /// Persist Kafka events into Postgres
    Consume(ConsumeArgs),
    /// Create the trade table
    Migrate(MigrateArgs),
    /// Show configuration
    Config,
}

/// Token cancelled on Ctrl-C or SIGTERM
pub fn shutdown_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown requested");
        trigger.cancel();
    });
    token
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
