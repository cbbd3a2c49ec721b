//! Per-symbol feed ingestion

use crate::broker::EventPublisher;
use crate::config::FeedConfig;
use crate::feed::{normalize, stream_url};
use crate::telemetry::{increment, CounterMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Ingestion counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub published: u64,
    pub decode_errors: u64,
    pub publish_errors: u64,
    pub connects: u64,
    pub reconnects: u64,
}

impl IngestStats {
    fn merge(&mut self, other: &IngestStats) {
        self.received += other.received;
        self.published += other.published;
        self.decode_errors += other.decode_errors;
        self.publish_errors += other.publish_errors;
        self.connects += other.connects;
        self.reconnects += other.reconnects;
    }
}

/// Runs one independent subscription per configured symbol and republishes
/// normalized events through a shared publisher
pub struct FeedIngester<P> {
    publisher: Arc<P>,
    config: FeedConfig,
}

impl<P: EventPublisher + 'static> FeedIngester<P> {
    pub fn new(publisher: Arc<P>, config: FeedConfig) -> Self {
        Self { publisher, config }
    }

    fn ws_config(&self, symbol: &str) -> WsConfig {
        WsConfig::new(stream_url(&self.config.base_url, symbol))
            .reconnect(self.config.reconnect)
            .connect_timeout(self.config.connect_timeout())
            .ping_interval(self.config.ping_interval())
            .pong_timeout(self.config.pong_timeout())
    }

    /// Ingest until `shutdown` is cancelled, then flush the publisher
    pub async fn run(&self, shutdown: CancellationToken) -> IngestStats {
        if self.config.symbols.is_empty() {
            tracing::warn!("No symbols configured, nothing to ingest");
        }

        let mut tasks = JoinSet::new();
        for symbol in &self.config.symbols {
            let client = WsClient::new(self.ws_config(symbol));
            let ws_rx = client.connect(shutdown.child_token());
            let publisher = Arc::clone(&self.publisher);
            let shutdown = shutdown.clone();
            let symbol = symbol.to_uppercase();

            tracing::info!(%symbol, url = %client.url(), "Starting ingestion");
            tasks.spawn(async move {
                run_message_loop(&symbol, ws_rx, publisher.as_ref(), &shutdown).await
            });
        }

        let mut total = IngestStats::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(stats) => total.merge(&stats),
                Err(e) => tracing::error!(error = %e, "Ingestion task failed"),
            }
        }

        if let Err(e) = self.publisher.flush(self.config.flush_timeout()).await {
            tracing::warn!(error = %e, "Producer flush incomplete at shutdown");
        }

        tracing::info!(
            received = total.received,
            published = total.published,
            decode_errors = total.decode_errors,
            publish_errors = total.publish_errors,
            "Ingestion stopped"
        );
        total
    }
}

/// Normalize and publish every text frame of one subscription
///
/// Decode and publish failures are logged and the loop moves on to the next
/// frame. The loop ends on shutdown or when the subscription closes.
pub async fn run_message_loop<P: EventPublisher + ?Sized>(
    symbol: &str,
    mut ws_rx: mpsc::Receiver<WsMessage>,
    publisher: &P,
    shutdown: &CancellationToken,
) -> IngestStats {
    let mut stats = IngestStats::default();

    loop {
        let msg = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            msg = ws_rx.recv() => msg,
        };

        let Some(msg) = msg else { break };

        match msg {
            WsMessage::Text(text) => {
                stats.received += 1;
                increment(CounterMetric::FeedMessages);

                let event = match normalize(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        stats.decode_errors += 1;
                        increment(CounterMetric::DecodeErrors);
                        tracing::warn!(%symbol, error = %e, "Invalid feed message skipped");
                        continue;
                    }
                };

                match publisher.publish(&event).await {
                    Ok(()) => {
                        stats.published += 1;
                        increment(CounterMetric::Published);
                        tracing::debug!(
                            symbol = %event.symbol,
                            price = %event.price,
                            event_time = event.event_time,
                            "Published event"
                        );
                    }
                    Err(e) => {
                        stats.publish_errors += 1;
                        increment(CounterMetric::PublishErrors);
                        tracing::error!(
                            symbol = %event.symbol,
                            event_time = event.event_time,
                            error = %e,
                            "Publish failed, event dropped"
                        );
                    }
                }
            }
            WsMessage::Connected => {
                stats.connects += 1;
                tracing::info!(%symbol, "Feed connected");
            }
            WsMessage::Reconnecting { attempt, delay } => {
                stats.reconnects += 1;
                increment(CounterMetric::Reconnects);
                tracing::warn!(
                    %symbol,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Feed reconnecting..."
                );
            }
            WsMessage::Disconnected => {
                tracing::info!(%symbol, "Feed disconnected");
                break;
            }
            WsMessage::Binary(_) => {
                // Binance doesn't send binary messages for trade streams
            }
        }
    }

    stats
}
