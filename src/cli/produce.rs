//! Produce command implementation

use crate::broker::KafkaPublisher;
use crate::config::Config;
use crate::ingest::FeedIngester;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct ProduceArgs {
    /// Symbols to ingest, overriding the configured list (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,
}

impl ProduceArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut feed = config.feed.clone();
        if !self.symbols.is_empty() {
            feed.symbols = self.symbols.clone();
        }

        let publisher = Arc::new(KafkaPublisher::new(&config.kafka)?);
        let ingester = FeedIngester::new(publisher, feed);

        let stats = ingester.run(super::shutdown_signal()).await;
        tracing::info!(
            published = stats.published,
            reconnects = stats.reconnects,
            "Producer stopped"
        );
        Ok(())
    }
}
