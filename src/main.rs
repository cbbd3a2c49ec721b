use clap::Parser;
use trade_relay::cli::{Cli, Commands};
use trade_relay::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    let _telemetry = trade_relay::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Produce(args) => {
            tracing::info!(symbols = ?config.feed.symbols, "Starting producer");
            args.execute(&config).await?;
        }
        Commands::Consume(args) => {
            tracing::info!(topic = %config.kafka.topic, "Starting consumer");
            args.execute(&config).await?;
        }
        Commands::Migrate(args) => {
            tracing::info!("Running migrations");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Feed: {} {:?}", config.feed.base_url, config.feed.symbols);
            println!("  Reconnect: {:?}", config.feed.reconnect);
            println!(
                "  Kafka: {} topic={} group={}",
                config.kafka.bootstrap_servers, config.kafka.topic, config.kafka.group_id
            );
            println!(
                "  Store: pool={} acquire_timeout={}s",
                config.store.max_connections, config.store.acquire_timeout_secs
            );
            println!("  Consumer workers: {}", config.consumer.workers);
        }
    }

    Ok(())
}
