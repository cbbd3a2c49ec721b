//! Consume command implementation

use crate::broker::KafkaConsumer;
use crate::config::Config;
use crate::consumer::run_workers;
use crate::store::PgTradeStore;
use anyhow::Context;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Number of workers, overriding the configured count
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Do not create the trade table on startup
    #[arg(long)]
    pub skip_migrations: bool,
}

impl ConsumeArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = PgTradeStore::connect(&config.store)
            .await
            .context("Failed to connect to trade store")?;

        if config.store.run_migrations && !self.skip_migrations {
            store.ensure_schema().await?;
        }

        let mut consumer_config = config.consumer.clone();
        if let Some(workers) = self.workers {
            consumer_config.workers = workers;
        }
        let workers = consumer_config.workers.max(1);

        let consumers = (0..workers)
            .map(|_| KafkaConsumer::new(&config.kafka))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to create Kafka consumer")?;

        tracing::info!(workers, "Starting consumer workers");
        let stats = run_workers(
            consumers,
            Arc::new(store),
            consumer_config,
            super::shutdown_signal(),
        )
        .await?;

        tracing::info!(
            consumed = stats.consumed,
            persisted = stats.persisted,
            duplicates = stats.duplicates,
            skipped = stats.skipped,
            "Consumer stopped"
        );
        Ok(())
    }
}
